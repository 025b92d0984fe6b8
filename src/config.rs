//! Configuration management for the packing station
//!
//! Provides configuration loading, saving, and validation for station
//! identity, storage roots, camera selection, and the order-gate client.

use crate::errors::StationError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationConfig {
    pub station: StationSection,
    pub storage: StorageSection,
    pub gate: GateSection,
}

/// Station identity and recording limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationSection {
    /// Station name, embedded in clip file names and sidecars
    pub name: String,
    /// Camera device index
    pub camera_index: u32,
    /// Auto-stop after this many seconds of recording (0 disables)
    pub max_clip_seconds: u64,
}

/// Storage roots for in-flight and durable recordings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSection {
    /// Durable root for finished clips and sidecars (may be a NAS path)
    pub record_root: PathBuf,
    /// Scratch root for in-progress temp files. Must be a local path: an
    /// in-flight write to a network mount under an unreliable link corrupts
    /// the container.
    pub temp_root: PathBuf,
}

/// Order-status collaborator credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateSection {
    pub base_url: String,
    pub client_id: String,
    pub api_key: String,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            station: StationSection {
                name: "PACK-01".to_string(),
                camera_index: 0,
                max_clip_seconds: 0,
            },
            storage: StorageSection {
                record_root: PathBuf::from("./pack-records"),
                temp_root: PathBuf::from("./pack-temp"),
            },
            gate: GateSection {
                base_url: "https://api-seller.ozon.ru".to_string(),
                client_id: String::new(),
                api_key: String::new(),
            },
        }
    }
}

impl StationConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, StationError> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| StationError::Config(format!("Failed to read config file: {}", e)))?;

        let config: StationConfig = toml::from_str(&contents)
            .map_err(|e| StationError::Config(format!("Failed to parse config file: {}", e)))?;

        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), StationError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                StationError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| StationError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| StationError::Config(format!("Failed to write config file: {}", e)))?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Get default config file path
    pub fn default_path() -> PathBuf {
        PathBuf::from("packcam.toml")
    }

    /// Load from default location or fall back to defaults
    pub fn load_or_default() -> Self {
        Self::load_from_file(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Whether order-gate credentials are configured at all
    pub fn gate_configured(&self) -> bool {
        !self.gate.client_id.trim().is_empty() && !self.gate.api_key.trim().is_empty()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.station.name.trim().is_empty() {
            return Err("Station name must not be empty".to_string());
        }
        if self.storage.record_root.as_os_str().is_empty() {
            return Err("Record root must not be empty".to_string());
        }
        if self.storage.temp_root.as_os_str().is_empty() {
            return Err("Temp root must not be empty".to_string());
        }
        if is_network_path(&self.storage.temp_root) {
            return Err(format!(
                "Temp root {:?} looks like a network path; the scratch root must be local",
                self.storage.temp_root
            ));
        }
        Ok(())
    }
}

/// Reject UNC-style network prefixes for the scratch root. In-flight
/// container writes must not cross an unreliable link.
fn is_network_path(path: &Path) -> bool {
    let s = path.to_string_lossy();
    s.starts_with("\\\\") || s.starts_with("//")
}
