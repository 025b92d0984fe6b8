//! PackCam: recording-session core for an unattended packing-station kiosk
//!
//! A barcode scan starts video recording of a package being packed, a second
//! scan of the same code stops and persists it, and an order-status lookup
//! gates whether recording is permitted in the first place.
//!
//! # Components
//! - [`scan`] turns raw keystroke-like events into discrete barcode strings
//! - [`gate`] is the asynchronous, cancellable order-status permission check
//! - [`session`] is the recording state machine (at most one active recording)
//! - [`persist`] handles durable clip storage, metadata sidecars, archive-on-replace
//! - [`station`] is the kiosk orchestrator wiring everything together
//!
//! # Usage
//! ```rust,ignore
//! use packcam::config::StationConfig;
//! use packcam::station::Kiosk;
//!
//! let cfg = StationConfig::load_or_default();
//! let kiosk = Kiosk::new(&cfg, source, sinks, client, prompt)?;
//! // feed scanner characters and poll frames on a fixed interval:
//! kiosk.handle_char('4').await;
//! kiosk.pump_frame()?;
//! ```
pub mod config;
pub mod errors;
pub mod frame;
pub mod gate;
pub mod persist;
pub mod scan;
pub mod session;
pub mod sink;
pub mod source;
pub mod station;

// Testing utilities - fakes and synthetic data for offline testing
pub mod testing;

// Re-exports for convenience
pub use errors::StationError;
pub use frame::{PixelLayout, RawFrame};
pub use gate::{GateDecision, GateOutcome, OrderGate, OrderStatusClient};
pub use persist::{ClipMeta, StorageLayout};
pub use scan::{ScanDecoder, ScanEvent};
pub use session::{SessionEngine, SessionState};
pub use station::Kiosk;

/// Initialize logging for the kiosk core
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "packcam=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod lib_tests {
    #[test]
    fn test_crate_info() {
        assert_eq!(super::NAME, "packcam");
        assert!(!super::VERSION.is_empty());
    }
}
