//! Recording session state machine
//!
//! At most one recording is active in the whole process. All session fields
//! live behind a single mutex and are reachable only through transition
//! operations; nothing outside this module touches the writer handle or the
//! active flag directly.
//!
//! Lifecycle of one clip:
//! `Idle` → `begin` → `PendingFirstFrame` → first frame opens the writer →
//! `Recording` → `finalize` (move temp to durable storage, write sidecar)
//! or `discard` (delete temp) → `Idle`.
//!
//! Finalize and discard are idempotent: calling either with no active
//! recording is a no-op. Every exit path, including I/O failure, lands the
//! machine back in `Idle`; a recording is never left half-closed.

use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Local};

use crate::errors::StationError;
use crate::frame::RawFrame;
use crate::persist::{move_or_copy, ClipMeta, ClipPaths, StorageLayout};
use crate::sink::{SinkFactory, VideoSink};

/// Frame rate used when the source reports an invalid value (<= 1).
pub const DEFAULT_FPS: f64 = 30.0;

/// Externally observable session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    PendingFirstFrame,
    Recording,
    Finalizing,
}

/// How an incoming barcode relates to the current session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanDisposition {
    /// Nothing is recording; the barcode asks to start.
    StartRequested,
    /// Second scan of the active barcode (case-insensitive).
    SameBarcode,
    /// A different barcode was scanned mid-recording.
    OtherBarcode { active: String },
}

/// Result of feeding one frame into the session.
#[derive(Debug)]
pub enum FrameOutcome {
    /// No recording active; the frame was dropped.
    Ignored,
    /// First frame arrived and the writer was opened.
    WriterOpened,
    /// Frame appended to the active recording.
    Written,
    /// The configured maximum clip duration was reached.
    AutoFinalized(ClipMeta),
}

struct ActiveClip {
    barcode: String,
    started_at: DateTime<Local>,
    paths: ClipPaths,
    sink: Option<Box<dyn VideoSink>>,
}

struct Inner {
    state: SessionState,
    clip: Option<ActiveClip>,
}

/// The recording session engine. One instance per process.
pub struct SessionEngine {
    inner: Mutex<Inner>,
    layout: StorageLayout,
    sinks: Box<dyn SinkFactory>,
    /// `None` disables auto-stop.
    max_clip: Option<Duration>,
}

impl SessionEngine {
    pub fn new(
        layout: StorageLayout,
        sinks: Box<dyn SinkFactory>,
        max_clip: Option<Duration>,
    ) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: SessionState::Idle,
                clip: None,
            }),
            layout,
            sinks,
            max_clip,
        }
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().expect("lock poisoned").state
    }

    pub fn active_barcode(&self) -> Option<String> {
        self.inner
            .lock()
            .expect("lock poisoned")
            .clip
            .as_ref()
            .map(|c| c.barcode.clone())
    }

    /// Classify an incoming barcode against the current state. Pure read;
    /// the caller decides which transition to drive.
    pub fn scan_disposition(&self, barcode: &str) -> ScanDisposition {
        let inner = self.inner.lock().expect("lock poisoned");
        match &inner.clip {
            None => ScanDisposition::StartRequested,
            Some(clip) if clip.barcode.eq_ignore_ascii_case(barcode) => {
                ScanDisposition::SameBarcode
            }
            Some(clip) => ScanDisposition::OtherBarcode {
                active: clip.barcode.clone(),
            },
        }
    }

    /// Start a new recording cycle for `barcode`.
    ///
    /// Allocates the temp/final/meta path triple and enters
    /// `PendingFirstFrame`; the writer itself is opened lazily by the first
    /// frame, once actual dimensions are known.
    pub fn begin(&self, barcode: &str) -> Result<ClipPaths, StationError> {
        let mut inner = self.inner.lock().expect("lock poisoned");

        if let Some(active) = &inner.clip {
            return Err(StationError::AlreadyActive(active.barcode.clone()));
        }

        let started_at = Local::now();
        let paths = self
            .layout
            .allocate(barcode, started_at, self.sinks.extension())?;

        inner.clip = Some(ActiveClip {
            barcode: barcode.to_string(),
            started_at,
            paths: paths.clone(),
            sink: None,
        });
        inner.state = SessionState::PendingFirstFrame;

        log::info!("Recording pending first frame: {barcode} (temp={:?})", paths.temp);
        Ok(paths)
    }

    /// Feed one frame. While idle, frames are dropped; while pending, the
    /// first frame opens the writer; while recording, the frame is written
    /// in arrival order and the max-duration auto-stop is evaluated.
    pub fn on_frame(
        &self,
        frame: &RawFrame,
        reported_fps: f64,
    ) -> Result<FrameOutcome, StationError> {
        let mut guard = self.inner.lock().expect("lock poisoned");
        let inner = &mut *guard;

        match inner.state {
            SessionState::Idle | SessionState::Finalizing => Ok(FrameOutcome::Ignored),

            SessionState::PendingFirstFrame => {
                let fps = if reported_fps <= 1.0 {
                    DEFAULT_FPS
                } else {
                    reported_fps
                };

                let clip = inner.clip.as_mut().expect("pending state without clip");
                let sink =
                    match self
                        .sinks
                        .open(&clip.paths.temp, frame.width, frame.height, fps)
                    {
                        Ok(sink) => sink,
                        Err(e) => {
                            // Fatal for this attempt: drop the pending clip,
                            // return to Idle, let the operator re-scan.
                            let temp = clip.paths.temp.clone();
                            inner.clip = None;
                            inner.state = SessionState::Idle;
                            if temp.exists() {
                                if let Err(rm) = fs::remove_file(&temp) {
                                    log::warn!("Failed to remove pending temp {temp:?}: {rm}");
                                }
                            }
                            return Err(StationError::Writer(format!(
                                "Failed to open video writer: {e}"
                            )));
                        }
                    };

                let mut sink = sink;
                sink.write_rgb(&frame.to_rgb(), frame.width, frame.height)?;
                clip.sink = Some(sink);
                inner.state = SessionState::Recording;

                log::info!(
                    "Recording started: {} ({}x{} @ {fps} fps)",
                    clip.barcode,
                    frame.width,
                    frame.height
                );
                Ok(FrameOutcome::WriterOpened)
            }

            SessionState::Recording => {
                let clip = inner.clip.as_mut().expect("recording state without clip");
                if let Some(sink) = clip.sink.as_mut() {
                    sink.write_rgb(&frame.to_rgb(), frame.width, frame.height)?;
                }

                if let Some(limit) = self.max_clip {
                    let elapsed = Local::now()
                        .signed_duration_since(clip.started_at)
                        .to_std()
                        .unwrap_or(Duration::ZERO);
                    if elapsed >= limit {
                        let meta = Self::finalize_locked(&self.layout, inner, "auto-max-seconds")?
                            .expect("recording state had an active clip");
                        return Ok(FrameOutcome::AutoFinalized(meta));
                    }
                }

                Ok(FrameOutcome::Written)
            }
        }
    }

    /// Stop and persist the active recording. No-op when idle.
    ///
    /// The file move and sidecar write complete (or fail with a report)
    /// before the session reverts to `Idle`, so a new start can never
    /// overlap an unfinished finalize.
    pub fn finalize(&self, reason: &str) -> Result<Option<ClipMeta>, StationError> {
        let mut inner = self.inner.lock().expect("lock poisoned");
        Self::finalize_locked(&self.layout, &mut inner, reason)
    }

    fn finalize_locked(
        layout: &StorageLayout,
        inner: &mut Inner,
        reason: &str,
    ) -> Result<Option<ClipMeta>, StationError> {
        let Some(mut clip) = inner.clip.take() else {
            return Ok(None);
        };
        inner.state = SessionState::Finalizing;

        // Whatever happens below, this cycle ends in Idle.
        let result = (|| {
            if let Some(sink) = clip.sink.take() {
                sink.finish()
                    .map_err(|e| StationError::Finalize(format!("close writer: {e}")))?;
            }

            if !clip.paths.temp.is_file() {
                return Err(StationError::Finalize(format!(
                    "temp recording not found: {:?}",
                    clip.paths.temp
                )));
            }

            move_or_copy(&clip.paths.temp, &clip.paths.final_video)
                .map_err(|e| StationError::Finalize(format!("move to final path: {e}")))?;

            let meta = ClipMeta {
                barcode: clip.barcode.clone(),
                station: layout.station().to_string(),
                started_at: clip.started_at,
                finished_at: Local::now(),
                status: "OK".to_string(),
                reason: reason.to_string(),
                video_path: clip.paths.final_video.clone(),
            };
            layout.write_meta(&clip.paths.meta, &meta)?;

            Ok(meta)
        })();

        inner.state = SessionState::Idle;

        match result {
            Ok(meta) => {
                log::info!(
                    "Recording saved: {:?} (reason={reason})",
                    meta.video_path.file_name().unwrap_or_default()
                );
                Ok(Some(meta))
            }
            Err(e) => {
                // Temp file is left in place when the move failed entirely,
                // enabling manual recovery.
                log::error!("Finalize failed for {}: {e}", clip.barcode);
                Err(e)
            }
        }
    }

    /// Stop and delete the active recording. No-op when idle.
    /// Returns the deleted temp path, if any.
    pub fn discard(&self, reason: &str) -> Result<Option<PathBuf>, StationError> {
        let mut inner = self.inner.lock().expect("lock poisoned");

        let Some(mut clip) = inner.clip.take() else {
            return Ok(None);
        };

        if let Some(sink) = clip.sink.take() {
            if let Err(e) = sink.finish() {
                log::warn!("Writer close failed during discard: {e}");
            }
        }

        if clip.paths.temp.exists() {
            if let Err(e) = fs::remove_file(&clip.paths.temp) {
                log::warn!("Failed to delete temp {:?}: {e}", clip.paths.temp);
            }
        }

        inner.state = SessionState::Idle;
        log::info!("Recording discarded: {} (reason={reason})", clip.barcode);
        Ok(Some(clip.paths.temp))
    }
}
