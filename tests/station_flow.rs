//! End-to-end kiosk flow over fake collaborators
//!
//! Exercises the full scan → gate → record → persist pipeline with a
//! scripted frame source, a raw byte sink, and a static order status
//! client, asserting on the real files left on disk.

use std::path::Path;
use std::sync::Arc;

use walkdir::WalkDir;

use packcam::config::StationConfig;
use packcam::frame::PixelLayout;
use packcam::gate::{OrderStatusClient, PostingLookup};
use packcam::persist::StorageLayout;
use packcam::session::{FrameOutcome, SessionState};
use packcam::station::{ConflictChoice, ExistingClipsChoice, Kiosk, ScanOutcome};
use packcam::testing::{synthetic_frame, RawSinkFactory, ScriptedPrompt, StaticStatusClient, SyntheticSource};

struct Rig {
    kiosk: Arc<Kiosk>,
    source: SyntheticSource,
    prompt: Arc<ScriptedPrompt>,
    layout: StorageLayout,
    dir: tempfile::TempDir,
}

fn rig(client: Arc<dyn OrderStatusClient>) -> Rig {
    let dir = tempfile::tempdir().unwrap();

    let mut config = StationConfig::default();
    config.storage.record_root = dir.path().join("records");
    config.storage.temp_root = dir.path().join("temp");

    let layout = StorageLayout::new(
        &config.storage.record_root,
        &config.storage.temp_root,
        &config.station.name,
    );

    let source = SyntheticSource::new(30.0);
    let prompt = Arc::new(ScriptedPrompt::new());

    let kiosk = Kiosk::new(
        &config,
        Box::new(source.clone()),
        Box::new(RawSinkFactory),
        client,
        Box::new(prompt.clone()),
    )
    .unwrap();

    Rig {
        kiosk: Arc::new(kiosk),
        source,
        prompt,
        layout,
        dir,
    }
}

fn ready_client() -> Arc<StaticStatusClient> {
    Arc::new(StaticStatusClient::with_status("awaiting_packaging"))
}

fn feed_frame(rig: &Rig, n: u64) -> FrameOutcome {
    rig.source
        .queue_frame(synthetic_frame(n, 4, 4, PixelLayout::Rgb));
    rig.kiosk.pump_frame().unwrap()
}

fn files_under(root: &Path) -> Vec<String> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect()
}

#[tokio::test]
async fn test_scan_records_and_second_scan_persists() {
    let rig = rig(ready_client());

    match rig.kiosk.handle_scan("4607001234").await {
        ScanOutcome::Started { decision } => {
            assert!(decision.allowed);
            assert_eq!(decision.label, "READY TO PACK");
            assert_eq!(decision.posting_id.as_deref(), Some("12345-0001-1"));
        }
        other => panic!("expected start, got {other:?}"),
    }
    assert_eq!(rig.kiosk.session().state(), SessionState::PendingFirstFrame);

    assert!(matches!(feed_frame(&rig, 0), FrameOutcome::WriterOpened));
    assert!(matches!(feed_frame(&rig, 1), FrameOutcome::Written));
    assert_eq!(rig.kiosk.session().state(), SessionState::Recording);

    match rig.kiosk.handle_scan("4607001234").await {
        ScanOutcome::Finalized { barcode } => assert_eq!(barcode, "4607001234"),
        other => panic!("expected finalize, got {other:?}"),
    }
    assert_eq!(rig.kiosk.session().state(), SessionState::Idle);

    let clips = rig.layout.find_clips_by_barcode("4607001234", 20);
    assert_eq!(clips.len(), 1);
    assert_eq!(clips[0].reason, "second-scan");
    assert_eq!(clips[0].status, "OK");
    assert!(clips[0].video_path.is_file());
}

#[tokio::test]
async fn test_conflict_continue_keeps_active_recording() {
    let rig = rig(ready_client());

    rig.kiosk.handle_scan("CODE-A").await;
    feed_frame(&rig, 0);

    // Default scripted answer is Continue
    match rig.kiosk.handle_scan("CODE-B").await {
        ScanOutcome::ConflictIgnored { active } => assert_eq!(active, "CODE-A"),
        other => panic!("expected conflict ignored, got {other:?}"),
    }
    assert_eq!(rig.prompt.conflict_calls(), 1);
    assert_eq!(rig.kiosk.session().active_barcode().as_deref(), Some("CODE-A"));
    assert!(matches!(feed_frame(&rig, 1), FrameOutcome::Written));

    // CODE-B produced no artifacts anywhere
    assert!(rig.layout.find_clips_by_barcode("CODE-B", 20).is_empty());
    let temp_files = files_under(rig.dir.path().join("temp").as_path());
    assert_eq!(temp_files.len(), 1);
    assert!(temp_files[0].starts_with("CODE-A"));
}

#[tokio::test]
async fn test_conflict_finish_discards_without_autostart() {
    let rig = rig(ready_client());
    rig.prompt.push_conflict(ConflictChoice::Finish);

    rig.kiosk.handle_scan("CODE-A").await;
    feed_frame(&rig, 0);

    match rig.kiosk.handle_scan("CODE-B").await {
        ScanOutcome::ConflictDiscarded { active } => assert_eq!(active, "CODE-A"),
        other => panic!("expected discard, got {other:?}"),
    }

    // Back to Idle; B was not auto-started, the operator must re-scan
    assert_eq!(rig.kiosk.session().state(), SessionState::Idle);
    assert_eq!(rig.kiosk.session().active_barcode(), None);

    // No temp file, no sidecar, nothing durable for either code
    assert!(files_under(rig.dir.path().join("temp").as_path()).is_empty());
    assert!(rig.layout.find_clips_by_barcode("CODE", 20).is_empty());
}

#[tokio::test]
async fn test_cancelled_order_never_starts_recording() {
    let rig = rig(Arc::new(StaticStatusClient::with_status("cancelled")));

    match rig.kiosk.handle_scan("4607001234").await {
        ScanOutcome::NotAllowed { decision } => {
            assert!(!decision.allowed);
            assert!(decision.alert);
            assert_eq!(decision.label, "CANCELLED — DO NOT PACK");
        }
        other => panic!("expected not-allowed, got {other:?}"),
    }

    assert_eq!(rig.kiosk.session().state(), SessionState::Idle);
    assert!(matches!(feed_frame(&rig, 0), FrameOutcome::Ignored));
}

#[tokio::test]
async fn test_gate_failure_blocks_with_diagnostic() {
    let rig = rig(Arc::new(StaticStatusClient::failing("connection refused")));

    match rig.kiosk.handle_scan("4607001234").await {
        ScanOutcome::NotAllowed { decision } => {
            assert!(!decision.allowed);
            assert!(decision
                .diagnostic
                .unwrap()
                .contains("connection refused"));
        }
        other => panic!("expected not-allowed, got {other:?}"),
    }
    assert_eq!(rig.kiosk.session().state(), SessionState::Idle);
}

#[tokio::test]
async fn test_superseding_scan_wins_over_stale_lookup() {
    let client = Arc::new(StaticStatusClient::blocking(PostingLookup {
        posting_id: "12345-0001-1".to_string(),
        status: "awaiting_packaging".to_string(),
        image_urls: vec![],
    }));
    let rig = rig(client.clone());

    let kiosk = Arc::clone(&rig.kiosk);
    let stale = tokio::spawn(async move { kiosk.handle_scan("OLD-CODE").await });
    client.wait_until_blocked().await;

    let kiosk = Arc::clone(&rig.kiosk);
    let fresh = tokio::spawn(async move { kiosk.handle_scan("NEW-CODE").await });
    client.wait_until_blocked().await;

    client.release();
    client.release();

    assert!(matches!(stale.await.unwrap(), ScanOutcome::Superseded));
    assert!(matches!(fresh.await.unwrap(), ScanOutcome::Started { .. }));

    // Only the most recent scan reached the session
    assert_eq!(
        rig.kiosk.session().active_barcode().as_deref(),
        Some("NEW-CODE")
    );
    assert_eq!(client.lookup_count(), 2);
}

#[tokio::test]
async fn test_replace_archives_prior_clips() {
    let rig = rig(ready_client());
    rig.prompt.push_existing(ExistingClipsChoice::Replace);

    // First cycle produces a durable clip
    rig.kiosk.handle_scan("REP-1").await;
    feed_frame(&rig, 0);
    rig.kiosk.handle_scan("REP-1").await;
    let first = rig.layout.find_clips_by_barcode("REP-1", 20);
    assert_eq!(first.len(), 1);
    let old_video = first[0].video_path.clone();

    // Second cycle with Replace answer
    match rig.kiosk.handle_scan("REP-1").await {
        ScanOutcome::Started { .. } => {}
        other => panic!("expected start, got {other:?}"),
    }
    assert_eq!(rig.prompt.existing_calls(), 1);

    // Old pair moved, not deleted
    assert!(!old_video.exists());
    let archive = rig
        .dir
        .path()
        .join("records")
        .join("_replaced")
        .join("REP-1");
    let archived = files_under(&archive);
    assert_eq!(archived.len(), 2);

    feed_frame(&rig, 0);
    rig.kiosk.handle_scan("REP-1").await;

    // Archived sidecars stay discoverable; exactly one clip is live
    let clips = rig.layout.find_clips_by_barcode("REP-1", 20);
    assert_eq!(clips.iter().filter(|m| m.video_path.is_file()).count(), 1);
}

#[tokio::test]
async fn test_existing_clips_cancel_starts_nothing() {
    let rig = rig(ready_client());
    rig.prompt.push_existing(ExistingClipsChoice::Cancel);

    rig.kiosk.handle_scan("KEEP-1").await;
    feed_frame(&rig, 0);
    rig.kiosk.handle_scan("KEEP-1").await;

    assert!(matches!(
        rig.kiosk.handle_scan("KEEP-1").await,
        ScanOutcome::StartCancelled
    ));
    assert_eq!(rig.kiosk.session().state(), SessionState::Idle);
    assert_eq!(rig.layout.find_clips_by_barcode("KEEP-1", 20).len(), 1);
}

#[tokio::test]
async fn test_stop_and_delete_leaves_no_artifacts() {
    let rig = rig(ready_client());

    rig.kiosk.handle_scan("DEL-1").await;
    feed_frame(&rig, 0);
    feed_frame(&rig, 1);

    rig.kiosk.stop_and_delete().unwrap();
    assert_eq!(rig.kiosk.session().state(), SessionState::Idle);
    assert!(files_under(rig.dir.path().join("temp").as_path()).is_empty());
    assert!(rig.layout.find_clips_by_barcode("DEL-1", 20).is_empty());
}

#[tokio::test]
async fn test_shutdown_discards_active_recording() {
    let rig = rig(ready_client());

    rig.kiosk.handle_scan("SHUT-1").await;
    feed_frame(&rig, 0);
    feed_frame(&rig, 1);
    assert_eq!(rig.kiosk.session().state(), SessionState::Recording);

    rig.kiosk.shutdown();

    // Force-discard: no partially written temp survives, nothing durable
    assert_eq!(rig.kiosk.session().state(), SessionState::Idle);
    assert_eq!(rig.kiosk.session().active_barcode(), None);
    assert!(files_under(rig.dir.path().join("temp").as_path()).is_empty());
    assert!(rig.layout.find_clips_by_barcode("SHUT-1", 20).is_empty());

    // A second shutdown (as Drop will run too) is a no-op
    rig.kiosk.shutdown();
    assert_eq!(rig.kiosk.session().state(), SessionState::Idle);
}

#[tokio::test]
async fn test_scanner_characters_drive_the_workflow() {
    let rig = rig(ready_client());

    for ch in "4607001234".chars() {
        assert!(rig.kiosk.handle_char(ch).await.is_none());
    }
    match rig.kiosk.handle_char('\r').await {
        Some(ScanOutcome::Started { .. }) => {}
        other => panic!("expected start on terminator, got {other:?}"),
    }
    assert_eq!(
        rig.kiosk.session().active_barcode().as_deref(),
        Some("4607001234")
    );
}
