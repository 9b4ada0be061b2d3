//! Constants module to avoid magic numbers in the codebase

// Identity
pub const APP_NAME: &str = "treecache";
pub const ENV_PREFIX: &str = "TREECACHE_";
pub const LOCAL_CONFIG_PATH: &str = ".treecache/config.toml";

// Cache Configuration
pub const CACHE_SUBDIR: &str = "snapshots";
pub const DEFAULT_CACHE_LIFETIME_HOURS: f64 = 1.0;
pub const MAX_CACHE_LIFETIME_HOURS: f64 = 24.0 * 365.0 * 10.0; // 10 years

// Logging
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const VERBOSE_LOG_LEVEL: &str = "debug";
