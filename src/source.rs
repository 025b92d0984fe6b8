//! Frame sources
//!
//! The session does not own frame acquisition: an external polling loop
//! (fixed interval, ~33 ms) pulls frames from a [`FrameSource`] and feeds
//! them into the session. A `None` poll is a transient read failure and is
//! simply skipped.

use crate::errors::StationError;
use crate::frame::RawFrame;

/// Recommended fixed polling interval for the frame pump.
pub const POLL_INTERVAL_MS: u64 = 33;

/// A polled producer of raw video frames.
pub trait FrameSource: Send {
    /// Pull one frame if available. `None` means nothing this poll.
    fn poll_frame(&mut self) -> Option<RawFrame>;

    /// Frame rate as reported by the device. Values <= 1 are treated as
    /// invalid by consumers and replaced with a default.
    fn reported_frame_rate(&self) -> f64;
}

/// Webcam-backed frame source over nokhwa.
#[cfg(feature = "camera")]
pub struct CameraSource {
    camera: nokhwa::Camera,
}

#[cfg(feature = "camera")]
impl CameraSource {
    /// Open the camera at `index` and start streaming.
    ///
    /// A device that cannot be opened is fatal to the "camera ready"
    /// precondition: the kiosk refuses scans until it is.
    pub fn open(index: u32) -> Result<Self, StationError> {
        use nokhwa::pixel_format::RgbFormat;
        use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};

        let requested =
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);
        let mut camera = nokhwa::Camera::new(CameraIndex::Index(index), requested)
            .map_err(|e| StationError::Camera(format!("Failed to open camera {index}: {e}")))?;

        camera
            .open_stream()
            .map_err(|e| StationError::Camera(format!("Failed to start camera stream: {e}")))?;

        log::info!("Camera {index} opened: {}", camera.camera_format());
        Ok(Self { camera })
    }
}

#[cfg(feature = "camera")]
impl FrameSource for CameraSource {
    fn poll_frame(&mut self) -> Option<RawFrame> {
        use crate::frame::PixelLayout;
        use nokhwa::pixel_format::RgbFormat;

        let buffer = match self.camera.frame() {
            Ok(b) => b,
            Err(e) => {
                // Transient read failure: skip this poll.
                log::debug!("Frame poll failed: {e}");
                return None;
            }
        };

        let decoded = match buffer.decode_image::<RgbFormat>() {
            Ok(img) => img,
            Err(e) => {
                log::debug!("Frame decode failed: {e}");
                return None;
            }
        };

        let (width, height) = (decoded.width(), decoded.height());
        Some(RawFrame::new(
            width,
            height,
            PixelLayout::Rgb,
            decoded.into_raw(),
        ))
    }

    fn reported_frame_rate(&self) -> f64 {
        self.camera.frame_rate() as f64
    }
}

#[cfg(feature = "camera")]
impl Drop for CameraSource {
    fn drop(&mut self) {
        if let Err(e) = self.camera.stop_stream() {
            log::warn!("Failed to stop camera stream: {e}");
        }
    }
}
