//! Video write targets
//!
//! The session writes frames through the [`VideoSink`] seam so the state
//! machine can be exercised without a codec. The production implementation
//! encodes H.264 and muxes to MP4 (`recording` feature):
//! - openh264 for H.264 encoding
//! - muxide for MP4 muxing

use std::path::Path;

use crate::errors::StationError;

#[cfg(feature = "recording")]
mod encoder;
#[cfg(feature = "recording")]
mod mp4;

#[cfg(feature = "recording")]
pub use encoder::{EncodedFrame, H264Encoder};
#[cfg(feature = "recording")]
pub use mp4::{Mp4Sink, Mp4SinkFactory};

/// An open video write target for one recording.
pub trait VideoSink: Send {
    /// Append one tightly-packed RGB24 frame. Frames arrive in order and
    /// must be written in order.
    fn write_rgb(&mut self, rgb: &[u8], width: u32, height: u32) -> Result<(), StationError>;

    /// Close the container. Consumes the sink; a recording is never left
    /// half-closed.
    fn finish(self: Box<Self>) -> Result<(), StationError>;
}

/// Opens sinks lazily, once the first frame's actual dimensions are known.
pub trait SinkFactory: Send + Sync {
    fn open(
        &self,
        path: &Path,
        width: u32,
        height: u32,
        fps: f64,
    ) -> Result<Box<dyn VideoSink>, StationError>;

    /// File extension for clips produced by this factory (without dot).
    fn extension(&self) -> &'static str;
}
