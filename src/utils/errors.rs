use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the snapshot cache
///
/// A missing record is not an error; see [`crate::cache::SnapshotStore::try_load`].
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed cache record {}: {source}", .path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unsupported schema version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Remote scan error: {0}")]
    Scan(String),
}

impl CacheError {
    /// True for errors that mean the record exists but cannot be trusted
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            CacheError::Malformed { .. } | CacheError::UnsupportedVersion { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;
