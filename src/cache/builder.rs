use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tracing::{debug, warn};

use super::fingerprint::Repository;
use super::types::{DirectoryEntry, DirectoryIndex, Snapshot, SCHEMA_VERSION};
use crate::constants::DEFAULT_CACHE_LIFETIME_HOURS;

/// Collects the output of a remote scan into a [`Snapshot`]
///
/// The walker reports each directory it lists and each child it sees; the
/// builder keeps the adjacency-list shape and fills in identity, expiry and
/// aggregates when the scan is finished.
#[derive(Debug)]
pub struct SnapshotBuilder {
    repository_id: String,
    repository_name: String,
    fingerprint: String,
    lifetime: Duration,
    index: DirectoryIndex,
    // full_path -> parent it was first recorded under
    parents: HashMap<String, String>,
}

impl SnapshotBuilder {
    /// A non-positive `lifetime` falls back to the default lifetime
    pub fn new(repository: &Repository, lifetime: Duration) -> Self {
        let lifetime = if lifetime > Duration::zero() {
            lifetime
        } else {
            warn!(
                repository_id = %repository.id,
                lifetime_ms = lifetime.num_milliseconds(),
                "Non-positive cache lifetime, using default"
            );
            Duration::milliseconds((DEFAULT_CACHE_LIFETIME_HOURS * 3_600_000.0) as i64)
        };

        Self {
            repository_id: repository.id.clone(),
            repository_name: repository.name.clone(),
            fingerprint: repository.fingerprint(),
            lifetime,
            index: DirectoryIndex::new(),
            parents: HashMap::new(),
        }
    }

    /// Record that `path` was listed, even if it turned out empty
    pub fn add_directory(&mut self, path: impl Into<String>) -> &mut Self {
        self.index.entry(path.into()).or_default();
        self
    }

    /// Record `entry` as a direct child of `parent`
    ///
    /// An entry whose full path is already recorded is skipped, whether it
    /// repeats under the same parent or shows up under another one.
    pub fn add_entry(&mut self, parent: impl Into<String>, entry: DirectoryEntry) -> &mut Self {
        let parent = parent.into();
        if let Some(existing) = self.parents.get(&entry.full_path) {
            if *existing == parent {
                debug!(path = %entry.full_path, parent = %parent, "Skipping repeated entry");
            } else {
                warn!(
                    path = %entry.full_path,
                    first_parent = %existing,
                    parent = %parent,
                    "Skipping entry already listed under another directory"
                );
            }
            return self;
        }

        self.parents.insert(entry.full_path.clone(), parent.clone());
        self.index.entry(parent).or_default().push(entry);
        self
    }

    pub fn finish(self) -> Snapshot {
        self.finish_at(Utc::now())
    }

    /// Stamp the snapshot as scanned at `now`
    pub fn finish_at(self, now: DateTime<Utc>) -> Snapshot {
        let mut total_files = 0u64;
        let mut total_directories = 0u64;
        let mut total_size_bytes = 0u64;

        for entry in self.index.values().flatten() {
            if entry.is_directory {
                total_directories += 1;
            } else {
                total_files += 1;
                total_size_bytes = total_size_bytes.saturating_add(entry.size);
            }
        }

        Snapshot {
            repository_id: self.repository_id,
            repository_name: self.repository_name,
            last_scanned: now,
            expires_at: now
                .checked_add_signed(self.lifetime)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
            schema_version: SCHEMA_VERSION,
            identity_fingerprint: self.fingerprint,
            directory_index: self.index,
            total_files,
            total_directories,
            total_size_bytes,
        }
    }
}
