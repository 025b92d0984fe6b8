use thiserror::Error;

/// Crate-wide error type for the packing-station core.
#[derive(Debug, Error)]
pub enum StationError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("camera error: {0}")]
    Camera(String),
    #[error("order gate error: {0}")]
    Gate(String),
    #[error("video writer error: {0}")]
    Writer(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("finalization error: {0}")]
    Finalize(String),
    #[error("a recording is already active for barcode {0}")]
    AlreadyActive(String),
    #[cfg(feature = "recording")]
    #[error("encoding error: {0}")]
    Encoding(String),
    #[cfg(feature = "recording")]
    #[error("muxing error: {0}")]
    Muxing(String),
}

impl StationError {
    pub fn io(context: &str, e: std::io::Error) -> Self {
        StationError::Io(format!("{context}: {e}"))
    }
}
