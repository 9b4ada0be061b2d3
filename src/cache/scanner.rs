use chrono::Duration;

use super::fingerprint::Repository;
use super::types::Snapshot;
use crate::utils::Result;

/// Walks a remote repository and produces a fresh snapshot
///
/// Implemented by the transfer client; the cache only consumes the output.
/// Implementations usually drive a [`super::SnapshotBuilder`] with the
/// given lifetime.
pub trait RemoteTreeScanner {
    fn scan_remote_tree(&mut self, repository: &Repository, lifetime: Duration) -> Result<Snapshot>;
}

impl<F> RemoteTreeScanner for F
where
    F: FnMut(&Repository, Duration) -> Result<Snapshot>,
{
    fn scan_remote_tree(&mut self, repository: &Repository, lifetime: Duration) -> Result<Snapshot> {
        self(repository, lifetime)
    }
}
