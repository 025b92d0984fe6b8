//! Durable clip storage
//!
//! Finished recordings live under one folder per calendar day per station:
//! `<root>/<yyyy-MM-dd>/<station>/<barcode>_<yyyyMMdd_HHmmss_fff>_<station>.{ext,json}`.
//! While a recording is in flight its container is written to a local-only
//! scratch root using the same subtree and a `.part.<ext>` suffix, then
//! moved into place on finalize.
//!
//! Replace is non-destructive: prior `(video, sidecar)` pairs for a barcode
//! are moved into a `_replaced/<barcode>` subtree, never deleted.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::errors::StationError;

/// How many existing clips a barcode search will return at most.
pub const EXISTING_CLIPS_LIMIT: usize = 20;

/// Metadata sidecar written next to every finished clip.
///
/// Immutable once written; this is the durable record the search and
/// replace logic operates on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipMeta {
    pub barcode: String,
    pub station: String,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub status: String,
    pub reason: String,
    pub video_path: PathBuf,
}

/// The temp/final/meta path triple allocated for one recording.
///
/// Set exactly once at session creation and never mutated afterward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipPaths {
    pub temp: PathBuf,
    pub final_video: PathBuf,
    pub meta: PathBuf,
}

/// Path conventions for one station.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    record_root: PathBuf,
    temp_root: PathBuf,
    station: String,
}

impl StorageLayout {
    pub fn new(
        record_root: impl Into<PathBuf>,
        temp_root: impl Into<PathBuf>,
        station: impl Into<String>,
    ) -> Self {
        Self {
            record_root: record_root.into(),
            temp_root: temp_root.into(),
            station: station.into(),
        }
    }

    pub fn record_root(&self) -> &Path {
        &self.record_root
    }

    pub fn station(&self) -> &str {
        &self.station
    }

    /// Allocate the temp/final/meta triple for a new recording and create
    /// the day/station folders on both roots.
    pub fn allocate(
        &self,
        barcode: &str,
        now: DateTime<Local>,
        ext: &str,
    ) -> Result<ClipPaths, StationError> {
        let day = now.format("%Y-%m-%d").to_string();
        let stamp = now.format("%Y%m%d_%H%M%S_%3f").to_string();
        let base = format!("{}_{}_{}", safe_file_part(barcode), stamp, self.station);

        let temp_dir = self.temp_root.join(&day).join(&self.station);
        fs::create_dir_all(&temp_dir).map_err(|e| StationError::io("create temp folder", e))?;

        let final_dir = self.record_root.join(&day).join(&self.station);
        fs::create_dir_all(&final_dir).map_err(|e| StationError::io("create record folder", e))?;

        Ok(ClipPaths {
            temp: temp_dir.join(format!("{base}.part.{ext}")),
            final_video: final_dir.join(format!("{base}.{ext}")),
            meta: final_dir.join(format!("{base}.json")),
        })
    }

    /// Write a metadata sidecar (pretty-printed JSON).
    pub fn write_meta(&self, path: &Path, meta: &ClipMeta) -> Result<(), StationError> {
        let json = serde_json::to_string_pretty(meta)
            .map_err(|e| StationError::Io(format!("serialize sidecar: {e}")))?;
        fs::write(path, json).map_err(|e| StationError::io("write sidecar", e))
    }

    /// Scan all sidecars under the durable root for a barcode match
    /// (case-insensitive substring), capped at `limit` results.
    pub fn find_clips_by_barcode(&self, barcode_part: &str, limit: usize) -> Vec<ClipMeta> {
        let mut result = Vec::new();
        if !self.record_root.is_dir() {
            return result;
        }

        let needle = barcode_part.to_lowercase();
        for entry in WalkDir::new(&self.record_root)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            if entry.path().extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            // Unreadable or foreign JSON files are simply skipped.
            let Some(meta) = read_meta(entry.path()) else {
                continue;
            };

            if meta.barcode.to_lowercase().contains(&needle) {
                result.push(meta);
                if result.len() >= limit {
                    break;
                }
            }
        }

        result
    }

    /// Move prior `(video, sidecar)` pairs for `barcode` into the
    /// `_replaced/<barcode>` subtree. Returns the number of clips archived.
    pub fn archive_existing(
        &self,
        barcode: &str,
        existing: &[ClipMeta],
    ) -> Result<usize, StationError> {
        let archive_dir = self
            .record_root
            .join("_replaced")
            .join(safe_file_part(barcode));
        fs::create_dir_all(&archive_dir).map_err(|e| StationError::io("create archive folder", e))?;

        let mut archived = 0;
        for meta in existing {
            if meta.video_path.is_file() {
                let dst = archive_dir.join(file_name_of(&meta.video_path)?);
                move_with_overwrite(&meta.video_path, &dst)?;
                archived += 1;
            }

            let sidecar = meta.video_path.with_extension("json");
            if sidecar.is_file() {
                let dst = archive_dir.join(file_name_of(&sidecar)?);
                move_with_overwrite(&sidecar, &dst)?;
            }
        }

        log::info!("Archived {archived} prior clip(s) for {barcode} into {archive_dir:?}");
        Ok(archived)
    }
}

/// Read a sidecar, tolerating missing or malformed files.
pub fn read_meta(path: &Path) -> Option<ClipMeta> {
    let text = fs::read_to_string(path).ok()?;
    serde_json::from_str(&text).ok()
}

/// Move `src` to `dst`; when a plain rename fails (cross-device, network
/// target) fall back to copy + delete.
pub fn move_or_copy(src: &Path, dst: &Path) -> Result<(), StationError> {
    if dst.exists() {
        fs::remove_file(dst).map_err(|e| StationError::io("remove stale target", e))?;
    }

    if fs::rename(src, dst).is_ok() {
        return Ok(());
    }

    fs::copy(src, dst).map_err(|e| StationError::io("copy to final path", e))?;
    if let Err(e) = fs::remove_file(src) {
        log::warn!("Copied but failed to remove temp {src:?}: {e}");
    }
    Ok(())
}

fn move_with_overwrite(src: &Path, dst: &Path) -> Result<(), StationError> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).map_err(|e| StationError::io("create target folder", e))?;
    }
    if dst.exists() {
        fs::remove_file(dst).map_err(|e| StationError::io("remove stale archive entry", e))?;
    }
    if fs::rename(src, dst).is_ok() {
        return Ok(());
    }
    fs::copy(src, dst).map_err(|e| StationError::io("copy to archive", e))?;
    fs::remove_file(src).map_err(|e| StationError::io("remove archived original", e))
}

fn file_name_of(path: &Path) -> Result<&std::ffi::OsStr, StationError> {
    path.file_name()
        .ok_or_else(|| StationError::Io(format!("path has no file name: {path:?}")))
}

/// Replace filesystem-hostile characters so a barcode can be embedded in a
/// file name.
pub fn safe_file_part(s: &str) -> String {
    s.trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}
