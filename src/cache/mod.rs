// Gateway module for cache - follows the Train Station Pattern
// All external access must go through this gateway

// Private submodules - not directly accessible from outside
mod age;
mod builder;
mod fingerprint;
mod scanner;
mod store;
mod types;
mod validity;

// Public re-exports - the ONLY way to access cache functionality
pub use age::format_age;
pub use builder::SnapshotBuilder;
pub use fingerprint::{current_fingerprint, Repository};
pub use scanner::RemoteTreeScanner;
pub use store::{describe_snapshot, sanitize_id, SnapshotStore, RECORD_SUFFIX};
pub use types::{
    DirectoryEntry, DirectoryIndex, RecordSummary, Snapshot, SweepReport, SCHEMA_VERSION,
};
pub use validity::{is_usable, is_usable_at};
