pub mod app;
pub mod cache;
pub mod cli;
pub mod constants;
pub mod utils;

pub use app::{load_config, CacheConfig, Config};
pub use cache::{
    current_fingerprint, is_usable, is_usable_at, DirectoryEntry, RemoteTreeScanner, Repository,
    Snapshot, SnapshotBuilder, SnapshotStore,
};
pub use utils::{CacheError, Result};
