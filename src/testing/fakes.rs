//! Fake collaborators for offline tests

use std::collections::VecDeque;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::errors::StationError;
use crate::frame::RawFrame;
use crate::gate::{OrderStatusClient, PostingLookup};
use crate::sink::{SinkFactory, VideoSink};
use crate::source::FrameSource;
use crate::station::{ConflictChoice, ExistingClipsChoice, OperatorPrompt};

/// Sink that appends raw RGB bytes to the target file. Cheap enough for
/// state machine tests, and leaves a real temp file on disk so finalize
/// and discard paths exercise actual file moves and deletes.
pub struct RawSink {
    file: File,
}

impl VideoSink for RawSink {
    fn write_rgb(&mut self, rgb: &[u8], _width: u32, _height: u32) -> Result<(), StationError> {
        self.file
            .write_all(rgb)
            .map_err(|e| StationError::io("write raw frame", e))
    }

    fn finish(mut self: Box<Self>) -> Result<(), StationError> {
        self.file
            .flush()
            .map_err(|e| StationError::io("flush raw sink", e))
    }
}

#[derive(Debug, Default, Clone)]
pub struct RawSinkFactory;

impl SinkFactory for RawSinkFactory {
    fn open(
        &self,
        path: &Path,
        _width: u32,
        _height: u32,
        _fps: f64,
    ) -> Result<Box<dyn VideoSink>, StationError> {
        let file =
            File::create(path).map_err(|e| StationError::Writer(format!("create {path:?}: {e}")))?;
        Ok(Box::new(RawSink { file }))
    }

    fn extension(&self) -> &'static str {
        "raw"
    }
}

/// Factory whose `open` always fails, for writer-open failure paths.
#[derive(Debug, Default, Clone)]
pub struct FailingSinkFactory;

impl SinkFactory for FailingSinkFactory {
    fn open(
        &self,
        _path: &Path,
        _width: u32,
        _height: u32,
        _fps: f64,
    ) -> Result<Box<dyn VideoSink>, StationError> {
        Err(StationError::Writer("sink deliberately unavailable".into()))
    }

    fn extension(&self) -> &'static str {
        "raw"
    }
}

/// Frame source backed by a shared queue. Clones share the queue, so a
/// test can keep a handle and feed frames after handing the source to the
/// kiosk.
#[derive(Clone)]
pub struct SyntheticSource {
    frames: Arc<Mutex<VecDeque<RawFrame>>>,
    fps: f64,
}

impl SyntheticSource {
    pub fn new(fps: f64) -> Self {
        Self {
            frames: Arc::new(Mutex::new(VecDeque::new())),
            fps,
        }
    }

    pub fn queue_frame(&self, frame: RawFrame) {
        self.frames.lock().expect("lock poisoned").push_back(frame);
    }
}

impl FrameSource for SyntheticSource {
    fn poll_frame(&mut self) -> Option<RawFrame> {
        self.frames.lock().expect("lock poisoned").pop_front()
    }

    fn reported_frame_rate(&self) -> f64 {
        self.fps
    }
}

/// Order status client with a fixed response; optionally blocks inside
/// `lookup` until released, for cancellation tests.
pub struct StaticStatusClient {
    response: Result<PostingLookup, String>,
    blocking: bool,
    entered: Semaphore,
    release: Semaphore,
    lookups: AtomicUsize,
}

impl StaticStatusClient {
    pub fn with_status(status: &str) -> Self {
        Self::ok(PostingLookup {
            posting_id: "12345-0001-1".to_string(),
            status: status.to_string(),
            image_urls: Vec::new(),
        })
    }

    pub fn ok(lookup: PostingLookup) -> Self {
        Self {
            response: Ok(lookup),
            blocking: false,
            entered: Semaphore::new(0),
            release: Semaphore::new(0),
            lookups: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            response: Err(message.to_string()),
            blocking: false,
            entered: Semaphore::new(0),
            release: Semaphore::new(0),
            lookups: AtomicUsize::new(0),
        }
    }

    /// Lookups park inside the client until [`Self::release`] is called.
    pub fn blocking(lookup: PostingLookup) -> Self {
        Self {
            response: Ok(lookup),
            blocking: true,
            entered: Semaphore::new(0),
            release: Semaphore::new(0),
            lookups: AtomicUsize::new(0),
        }
    }

    /// Resolves once a lookup has entered and parked.
    pub async fn wait_until_blocked(&self) {
        self.entered
            .acquire()
            .await
            .expect("semaphore closed")
            .forget();
    }

    /// Let one parked lookup proceed.
    pub fn release(&self) {
        self.release.add_permits(1);
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OrderStatusClient for StaticStatusClient {
    async fn lookup(&self, _barcode: &str) -> Result<PostingLookup, StationError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);

        if self.blocking {
            self.entered.add_permits(1);
            self.release
                .acquire()
                .await
                .expect("semaphore closed")
                .forget();
        }

        self.response.clone().map_err(StationError::Gate)
    }
}

/// Prompt answering from scripted queues; defaults to the non-destructive
/// choices (keep-as-new, continue) when a queue runs dry.
#[derive(Default)]
pub struct ScriptedPrompt {
    existing: Mutex<VecDeque<ExistingClipsChoice>>,
    conflicts: Mutex<VecDeque<ConflictChoice>>,
    existing_calls: AtomicUsize,
    conflict_calls: AtomicUsize,
}

impl ScriptedPrompt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_existing(&self, choice: ExistingClipsChoice) {
        self.existing
            .lock()
            .expect("lock poisoned")
            .push_back(choice);
    }

    pub fn push_conflict(&self, choice: ConflictChoice) {
        self.conflicts
            .lock()
            .expect("lock poisoned")
            .push_back(choice);
    }

    pub fn existing_calls(&self) -> usize {
        self.existing_calls.load(Ordering::SeqCst)
    }

    pub fn conflict_calls(&self) -> usize {
        self.conflict_calls.load(Ordering::SeqCst)
    }
}

impl OperatorPrompt for ScriptedPrompt {
    fn existing_clips(&self, _barcode: &str, _count: usize) -> ExistingClipsChoice {
        self.existing_calls.fetch_add(1, Ordering::SeqCst);
        self.existing
            .lock()
            .expect("lock poisoned")
            .pop_front()
            .unwrap_or(ExistingClipsChoice::KeepAsNew)
    }

    fn recording_conflict(&self, _active: &str, _scanned: &str) -> ConflictChoice {
        self.conflict_calls.fetch_add(1, Ordering::SeqCst);
        self.conflicts
            .lock()
            .expect("lock poisoned")
            .pop_front()
            .unwrap_or(ConflictChoice::Continue)
    }
}
