use chrono::{DateTime, Utc};

use super::fingerprint::Repository;
use super::types::Snapshot;

/// Whether a loaded snapshot may stand in for a fresh remote scan
pub fn is_usable(snapshot: Option<&Snapshot>, repository: &Repository) -> bool {
    is_usable_at(snapshot, repository, Utc::now())
}

/// Usable iff not expired at `now`, fingerprint matches, and the schema is current
pub fn is_usable_at(snapshot: Option<&Snapshot>, repository: &Repository, now: DateTime<Utc>) -> bool {
    let Some(snapshot) = snapshot else {
        return false;
    };

    if snapshot.is_expired_at(now) {
        return false;
    }

    if snapshot.identity_fingerprint != repository.fingerprint() {
        return false;
    }

    snapshot.has_supported_schema()
}
