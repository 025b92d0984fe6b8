//! Kiosk orchestrator
//!
//! Wires the pipeline together: scanner characters flow through the
//! [`ScanDecoder`], completed barcodes through the [`OrderGate`] and into
//! the [`SessionEngine`], and a fixed-interval poll pumps frames from the
//! [`FrameSource`] into the active recording.
//!
//! Operator interaction (conflict and replace prompts) is delegated to an
//! [`OperatorPrompt`] implementation; the UI toolkit itself is out of scope.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::StationConfig;
use crate::errors::StationError;
use crate::gate::{GateDecision, GateOutcome, OrderGate, OrderStatusClient};
use crate::persist::{StorageLayout, EXISTING_CLIPS_LIMIT};
use crate::scan::ScanDecoder;
use crate::session::{FrameOutcome, ScanDisposition, SessionEngine};
use crate::sink::SinkFactory;
use crate::source::FrameSource;

/// Operator's answer when clips for the scanned barcode already exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExistingClipsChoice {
    /// Archive the old pairs into `_replaced/<barcode>` first.
    Replace,
    /// Keep the old clips; record an additional version.
    KeepAsNew,
    /// Do not start a recording.
    Cancel,
}

/// Operator's answer when a different barcode is scanned mid-recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictChoice {
    /// Stop and delete the current recording. The new barcode is NOT
    /// auto-started; the operator must re-scan.
    Finish,
    /// Keep recording; the new barcode is ignored.
    Continue,
}

/// Modal decision points surfaced to the operator.
///
/// UI note: the conflict dialog deliberately binds Enter to `Finish` and
/// Escape to `Continue`, failing toward not silently losing a conflicting
/// capture.
pub trait OperatorPrompt: Send + Sync {
    fn existing_clips(&self, barcode: &str, count: usize) -> ExistingClipsChoice;
    fn recording_conflict(&self, active: &str, scanned: &str) -> ConflictChoice;
}

impl<P: OperatorPrompt + ?Sized> OperatorPrompt for Arc<P> {
    fn existing_clips(&self, barcode: &str, count: usize) -> ExistingClipsChoice {
        (**self).existing_clips(barcode, count)
    }

    fn recording_conflict(&self, active: &str, scanned: &str) -> ConflictChoice {
        (**self).recording_conflict(active, scanned)
    }
}

/// What a handled scan amounted to, for status display.
#[derive(Debug)]
pub enum ScanOutcome {
    /// Gate allowed packing; a recording cycle was started.
    Started { decision: GateDecision },
    /// Gate refused; nothing was started.
    NotAllowed { decision: GateDecision },
    /// A newer scan superseded this one while its lookup was in flight.
    Superseded,
    /// Second scan of the active barcode finalized the recording.
    Finalized { barcode: String },
    /// Conflict prompt answered "Finish": current recording discarded.
    ConflictDiscarded { active: String },
    /// Conflict prompt answered "Continue": new barcode ignored.
    ConflictIgnored { active: String },
    /// Operator cancelled the existing-clips prompt.
    StartCancelled,
}

/// The packing-station kiosk core.
pub struct Kiosk {
    decoder: Mutex<ScanDecoder>,
    gate: OrderGate,
    session: SessionEngine,
    layout: StorageLayout,
    source: Mutex<Box<dyn FrameSource>>,
    prompt: Box<dyn OperatorPrompt>,
}

impl Kiosk {
    pub fn new(
        config: &StationConfig,
        source: Box<dyn FrameSource>,
        sinks: Box<dyn SinkFactory>,
        client: Arc<dyn OrderStatusClient>,
        prompt: Box<dyn OperatorPrompt>,
    ) -> Result<Self, StationError> {
        config.validate().map_err(StationError::Config)?;

        let layout = StorageLayout::new(
            &config.storage.record_root,
            &config.storage.temp_root,
            &config.station.name,
        );
        let max_clip = match config.station.max_clip_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        let session = SessionEngine::new(layout.clone(), sinks, max_clip);

        Ok(Self {
            decoder: Mutex::new(ScanDecoder::new()),
            gate: OrderGate::new(client),
            session,
            layout,
            source: Mutex::new(source),
            prompt,
        })
    }

    pub fn session(&self) -> &SessionEngine {
        &self.session
    }

    /// Feed one scanner character. When the character completes a barcode,
    /// the full scan workflow runs and its outcome is returned.
    pub async fn handle_char(&self, ch: char) -> Option<ScanOutcome> {
        let event = self.decoder.lock().expect("lock poisoned").push_char(ch)?;
        Some(self.handle_scan(&event.code).await)
    }

    /// Run the scan workflow for a completed barcode.
    pub async fn handle_scan(&self, barcode: &str) -> ScanOutcome {
        match self.session.scan_disposition(barcode) {
            ScanDisposition::SameBarcode => match self.session.finalize("second-scan") {
                Ok(_) => ScanOutcome::Finalized {
                    barcode: barcode.to_string(),
                },
                Err(e) => {
                    // State is back in Idle regardless; report and move on.
                    log::error!("Finalize after second scan failed: {e}");
                    ScanOutcome::Finalized {
                        barcode: barcode.to_string(),
                    }
                }
            },

            ScanDisposition::OtherBarcode { active } => {
                match self.prompt.recording_conflict(&active, barcode) {
                    ConflictChoice::Finish => {
                        if let Err(e) = self.session.discard("stop-from-other-barcode") {
                            log::error!("Discard after conflict failed: {e}");
                        }
                        ScanOutcome::ConflictDiscarded { active }
                    }
                    ConflictChoice::Continue => {
                        log::info!("Continuing recording for {active}, ignoring {barcode}");
                        ScanOutcome::ConflictIgnored { active }
                    }
                }
            }

            ScanDisposition::StartRequested => self.start_flow(barcode).await,
        }
    }

    async fn start_flow(&self, barcode: &str) -> ScanOutcome {
        let decision = match self.gate.check(barcode).await {
            GateOutcome::Superseded => return ScanOutcome::Superseded,
            GateOutcome::Decision(d) => d,
        };

        if !decision.allowed {
            log::info!(
                "Recording not started for {barcode}: {} ({:?})",
                decision.label,
                decision.status
            );
            return ScanOutcome::NotAllowed { decision };
        }

        let existing = self
            .layout
            .find_clips_by_barcode(barcode, EXISTING_CLIPS_LIMIT);
        if !existing.is_empty() {
            match self.prompt.existing_clips(barcode, existing.len()) {
                ExistingClipsChoice::Cancel => return ScanOutcome::StartCancelled,
                ExistingClipsChoice::Replace => {
                    if let Err(e) = self.layout.archive_existing(barcode, &existing) {
                        log::error!("Archiving prior clips for {barcode} failed: {e}");
                        return ScanOutcome::StartCancelled;
                    }
                }
                ExistingClipsChoice::KeepAsNew => {}
            }
        }

        match self.session.begin(barcode) {
            Ok(_) => ScanOutcome::Started { decision },
            Err(e) => {
                log::error!("Failed to begin recording for {barcode}: {e}");
                ScanOutcome::StartCancelled
            }
        }
    }

    /// One frame-pump tick: poll the source and feed the session. A `None`
    /// poll (transient read failure) is skipped with no state effect.
    pub fn pump_frame(&self) -> Result<FrameOutcome, StationError> {
        let (frame, fps) = {
            let mut source = self.source.lock().expect("lock poisoned");
            match source.poll_frame() {
                Some(frame) => (frame, source.reported_frame_rate()),
                None => return Ok(FrameOutcome::Ignored),
            }
        };
        self.session.on_frame(&frame, fps)
    }

    /// Operator STOP button: stop and delete the active recording.
    pub fn stop_and_delete(&self) -> Result<(), StationError> {
        self.session.discard("manual-stop-delete").map(|_| ())
    }

    /// Shutdown: invalidate any in-flight gate lookup and force-discard an
    /// active recording rather than leave a partially written temp file.
    pub fn shutdown(&self) {
        self.gate.supersede();
        if let Err(e) = self.session.discard("app-closing") {
            log::warn!("Discard at shutdown failed: {e}");
        }
    }
}

impl Drop for Kiosk {
    fn drop(&mut self) {
        self.shutdown();
    }
}
