//! Packing-station kiosk runner
//!
//! Headless console front-end for the kiosk core: opens the configured
//! camera, pumps frames on a fixed interval, and treats each line on stdin
//! as a barcode scan. Ctrl-C discards any active recording before exit.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::AsyncBufReadExt;

use packcam::config::StationConfig;
use packcam::errors::StationError;
use packcam::gate::{OrderStatusClient, PostingLookup};
use packcam::session::FrameOutcome;
use packcam::sink::Mp4SinkFactory;
use packcam::source::{CameraSource, POLL_INTERVAL_MS};
use packcam::station::{ConflictChoice, ExistingClipsChoice, Kiosk, OperatorPrompt, ScanOutcome};

/// Stand-in order status client used until real gate credentials are wired
/// in. Every lookup reports the gate as not configured, which the kiosk
/// surfaces as a blocked decision with a diagnostic rather than an error.
struct UnconfiguredGate;

#[async_trait]
impl OrderStatusClient for UnconfiguredGate {
    async fn lookup(&self, _barcode: &str) -> Result<PostingLookup, StationError> {
        Err(StationError::Gate("order gate is not configured".into()))
    }
}

/// Console prompt. Unattended operation favors the non-destructive answers:
/// prior clips are kept as additional versions and a conflicting scan never
/// silently kills the running capture.
struct ConsolePrompt;

impl OperatorPrompt for ConsolePrompt {
    fn existing_clips(&self, barcode: &str, count: usize) -> ExistingClipsChoice {
        println!("{count} existing clip(s) for {barcode}; recording an additional version");
        ExistingClipsChoice::KeepAsNew
    }

    fn recording_conflict(&self, active: &str, scanned: &str) -> ConflictChoice {
        println!("Recording for {active} still running; ignoring scan of {scanned}");
        ConflictChoice::Continue
    }
}

fn report(outcome: &ScanOutcome) {
    match outcome {
        ScanOutcome::Started { decision } => {
            println!(
                "{}: recording started ({})",
                decision.label,
                decision.posting_id.as_deref().unwrap_or("no posting id")
            );
        }
        ScanOutcome::NotAllowed { decision } => {
            println!("{}: recording not started", decision.label);
            if let Some(diag) = &decision.diagnostic {
                println!("  ({diag})");
            }
        }
        ScanOutcome::Superseded => {}
        ScanOutcome::Finalized { barcode } => println!("Saved clip for {barcode}"),
        ScanOutcome::ConflictDiscarded { active } => {
            println!("Recording for {active} stopped and deleted")
        }
        ScanOutcome::ConflictIgnored { .. } => {}
        ScanOutcome::StartCancelled => println!("Recording not started"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    packcam::init_logging();
    log::info!("{} v{}", packcam::NAME, packcam::VERSION);

    let config_path = StationConfig::default_path();
    let had_config = config_path.exists();
    let config = StationConfig::load_or_default();
    if !had_config {
        config
            .save_to_file(&config_path)
            .context("write default configuration")?;
        log::info!("Wrote default configuration to {}", config_path.display());
    }

    if !config.gate_configured() {
        log::warn!("Gate credentials missing; scans will be blocked with a diagnostic");
    }

    let source = CameraSource::open(config.station.camera_index).context("open camera")?;
    let kiosk = Arc::new(
        Kiosk::new(
            &config,
            Box::new(source),
            Box::new(Mp4SinkFactory),
            Arc::new(UnconfiguredGate),
            Box::new(ConsolePrompt),
        )
        .context("initialize kiosk")?,
    );

    let (shutdown_tx, mut shutdown_rx) = tokio::sync::mpsc::channel::<()>(1);
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.try_send(());
    })
    .context("install Ctrl-C handler")?;

    let pump = {
        let kiosk = Arc::clone(&kiosk);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(Duration::from_millis(POLL_INTERVAL_MS));
            loop {
                tick.tick().await;
                match kiosk.pump_frame() {
                    Ok(FrameOutcome::AutoFinalized(meta)) => {
                        log::info!("Max clip length reached; saved clip for {}", meta.barcode);
                    }
                    Ok(_) => {}
                    Err(e) => log::error!("Frame pump: {e}"),
                }
            }
        })
    };

    println!("Station {} ready. Scan a barcode (or type one):", config.station.name);
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                log::info!("Shutdown requested");
                break;
            }
            line = lines.next_line() => {
                match line.context("read stdin")? {
                    Some(line) => {
                        let code = line.trim();
                        if code.is_empty() {
                            continue;
                        }
                        report(&kiosk.handle_scan(code).await);
                    }
                    None => break,
                }
            }
        }
    }

    pump.abort();
    kiosk.shutdown();
    Ok(())
}
