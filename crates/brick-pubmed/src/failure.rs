//! Persistent per-file failure records
//!
//! A failed input leaves `<log_dir>/<source_file>.error.json`. The record is
//! overwritten if the file fails again and removed once it converts.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Suffix of failure record files
pub const FAILURE_SUFFIX: &str = ".error.json";

/// Why one input file produced no output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub source_file: String,
    pub error_kind: String,
    pub error_message: String,
    pub timestamp: DateTime<Utc>,
}

impl FailureRecord {
    pub fn new(source_file: impl Into<String>, error: &Error) -> Self {
        Self {
            source_file: source_file.into(),
            error_kind: error.kind().to_string(),
            error_message: error.to_string(),
            timestamp: Utc::now(),
        }
    }

    /// Record location for `source_file`
    pub fn path_for(log_dir: &Path, source_file: &str) -> PathBuf {
        log_dir.join(format!("{source_file}{FAILURE_SUFFIX}"))
    }

    /// Write atomically (tmp → rename), replacing any earlier record
    pub fn write_to(&self, log_dir: &Path) -> io::Result<PathBuf> {
        let path = Self::path_for(log_dir, &self.source_file);
        let tmp = log_dir.join(format!("{}{FAILURE_SUFFIX}.tmp", self.source_file));
        let json = serde_json::to_vec_pretty(self).map_err(io::Error::other)?;
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;
        Ok(path)
    }

    pub fn read_from(path: &Path) -> io::Result<Self> {
        let bytes = fs::read(path)?;
        serde_json::from_slice(&bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

/// Remove the record for `source_file`. Returns whether one existed.
pub fn clear_failure(log_dir: &Path, source_file: &str) -> io::Result<bool> {
    match fs::remove_file(FailureRecord::path_for(log_dir, source_file)) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Paths of all failure records in `log_dir`, sorted by name.
///
/// A missing directory has no failures.
pub fn failure_paths(log_dir: &Path) -> io::Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(log_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };
    let mut paths = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let is_record = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(FAILURE_SUFFIX));
        if is_record && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// All readable failure records, newest first. Unreadable ones are skipped.
pub fn list_failures(log_dir: &Path) -> io::Result<Vec<FailureRecord>> {
    let mut records: Vec<FailureRecord> = failure_paths(log_dir)?
        .iter()
        .filter_map(|path| match FailureRecord::read_from(path) {
            Ok(record) => Some(record),
            Err(e) => {
                log::warn!("Skipping unreadable failure record {}: {e}", path.display());
                None
            }
        })
        .collect();
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    Ok(records)
}
