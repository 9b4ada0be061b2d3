use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Schema version this build reads and writes; bump when the record layout changes
pub const SCHEMA_VERSION: u32 = 1;

/// Remote directory path -> its direct children, in scan order
pub type DirectoryIndex = BTreeMap<String, Vec<DirectoryEntry>>;

/// One item observed during a remote scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryEntry {
    pub name: String,
    /// Repository-root-relative remote path
    pub full_path: String,
    pub is_directory: bool,
    /// Byte count, 0 for directories
    #[serde(default)]
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

impl DirectoryEntry {
    pub fn file(
        name: impl Into<String>,
        full_path: impl Into<String>,
        size: u64,
        last_modified: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            full_path: full_path.into(),
            is_directory: false,
            size,
            last_modified,
        }
    }

    pub fn directory(
        name: impl Into<String>,
        full_path: impl Into<String>,
        last_modified: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            full_path: full_path.into(),
            is_directory: true,
            size: 0,
            last_modified,
        }
    }
}

/// Cached listing of one repository's remote tree
///
/// Immutable once built; aggregates are computed at build time and never
/// recomputed on read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub repository_id: String,
    /// Display label only, not part of identity
    pub repository_name: String,
    pub last_scanned: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub schema_version: u32,
    pub identity_fingerprint: String,
    pub directory_index: DirectoryIndex,
    pub total_files: u64,
    pub total_directories: u64,
    pub total_size_bytes: u64,
}

impl Snapshot {
    /// Expired at or after `expires_at`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Time elapsed since the scan, clamped at zero for clocks that moved backwards
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        let age = now.signed_duration_since(self.last_scanned);
        if age < Duration::zero() {
            Duration::zero()
        } else {
            age
        }
    }

    pub fn has_supported_schema(&self) -> bool {
        self.schema_version == SCHEMA_VERSION
    }

    /// Direct children of a remote directory, if it was scanned
    pub fn children(&self, directory: &str) -> Option<&[DirectoryEntry]> {
        self.directory_index.get(directory).map(Vec::as_slice)
    }
}

/// Short per-record view used by listings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSummary {
    pub repository_id: String,
    pub repository_name: String,
    pub last_scanned: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub total_files: u64,
    pub total_directories: u64,
    pub total_size_bytes: u64,
}

impl From<&Snapshot> for RecordSummary {
    fn from(snapshot: &Snapshot) -> Self {
        Self {
            repository_id: snapshot.repository_id.clone(),
            repository_name: snapshot.repository_name.clone(),
            last_scanned: snapshot.last_scanned,
            expires_at: snapshot.expires_at,
            total_files: snapshot.total_files,
            total_directories: snapshot.total_directories,
            total_size_bytes: snapshot.total_size_bytes,
        }
    }
}

/// Outcome of an expired-record sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Records confirmed expired and removed
    pub deleted: usize,
    /// Records still within their lifetime
    pub retained: usize,
    /// Records that could not be read or decoded; left in place
    pub unreadable: usize,
}
