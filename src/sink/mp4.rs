//! MP4 video sink combining the H.264 encoder and the muxide muxer

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use muxide::api::{Metadata, MuxerBuilder, VideoCodec};

use super::encoder::H264Encoder;
use super::{SinkFactory, VideoSink};
use crate::errors::StationError;

/// One open MP4 recording.
pub struct Mp4Sink {
    encoder: H264Encoder,
    muxer: muxide::api::Muxer<BufWriter<File>>,
    width: u32,
    height: u32,
    frame_count: u64,
    frame_duration_secs: f64,
}

impl Mp4Sink {
    pub fn create(path: &Path, width: u32, height: u32, fps: f64) -> Result<Self, StationError> {
        let file = File::create(path)
            .map_err(|e| StationError::Writer(format!("Failed to create {path:?}: {e}")))?;
        let writer = BufWriter::new(file);

        let encoder = H264Encoder::new(width, height)?;

        let metadata = Metadata::new().with_current_time();
        let muxer = MuxerBuilder::new(writer)
            .video(VideoCodec::H264, width, height, fps)
            .with_fast_start(false)
            .with_metadata(metadata)
            .build()
            .map_err(|e| StationError::Muxing(format!("Failed to create muxer: {e}")))?;

        Ok(Self {
            encoder,
            muxer,
            width,
            height,
            frame_count: 0,
            frame_duration_secs: 1.0 / fps,
        })
    }
}

impl VideoSink for Mp4Sink {
    fn write_rgb(&mut self, rgb: &[u8], width: u32, height: u32) -> Result<(), StationError> {
        if width != self.width || height != self.height {
            return Err(StationError::Encoding(format!(
                "Frame dimensions {}x{} don't match sink {}x{}",
                width, height, self.width, self.height
            )));
        }

        let encoded = self.encoder.encode_rgb(rgb)?;

        // The encoder may return no data for some frames; nothing to mux.
        if encoded.data.is_empty() {
            return Ok(());
        }

        let pts = self.frame_count as f64 * self.frame_duration_secs;
        self.muxer
            .write_video(pts, &encoded.data, encoded.is_keyframe)
            .map_err(|e| StationError::Muxing(format!("Failed to write frame: {e}")))?;

        self.frame_count += 1;
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<(), StationError> {
        let stats = self
            .muxer
            .finish_with_stats()
            .map_err(|e| StationError::Muxing(format!("Failed to finalize container: {e}")))?;
        log::debug!(
            "Container closed: {} frames, {} bytes",
            stats.video_frames,
            stats.bytes_written
        );
        Ok(())
    }
}

/// Factory producing [`Mp4Sink`]s.
#[derive(Debug, Default, Clone)]
pub struct Mp4SinkFactory;

impl SinkFactory for Mp4SinkFactory {
    fn open(
        &self,
        path: &Path,
        width: u32,
        height: u32,
        fps: f64,
    ) -> Result<Box<dyn VideoSink>, StationError> {
        Ok(Box::new(Mp4Sink::create(path, width, height, fps)?))
    }

    fn extension(&self) -> &'static str {
        "mp4"
    }
}
