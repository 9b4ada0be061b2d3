use anyhow::{Context, Result};
use chrono::Duration;
use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::constants::{
    APP_NAME, CACHE_SUBDIR, DEFAULT_CACHE_LIFETIME_HOURS, DEFAULT_LOG_LEVEL, ENV_PREFIX,
    LOCAL_CONFIG_PATH, MAX_CACHE_LIFETIME_HOURS,
};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Snapshot cache configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Snapshot cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// How long a fresh snapshot stays usable, in hours
    pub lifetime_hours: f64,
    /// Where snapshot records live (defaults to the platform cache dir)
    pub directory: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            lifetime_hours: DEFAULT_CACHE_LIFETIME_HOURS,
            directory: None,
        }
    }
}

impl CacheConfig {
    /// Lifetime applied to newly built snapshots
    ///
    /// Only the resulting `expires_at` is persisted, so changing this never
    /// affects snapshots already on disk.
    pub fn lifetime(&self) -> Duration {
        let hours = self.lifetime_hours;
        if !hours.is_finite() || hours <= 0.0 {
            warn!(
                lifetime_hours = hours,
                "Invalid cache lifetime, using default of {} hour(s)",
                DEFAULT_CACHE_LIFETIME_HOURS
            );
            return hours_to_duration(DEFAULT_CACHE_LIFETIME_HOURS);
        }
        hours_to_duration(hours.min(MAX_CACHE_LIFETIME_HOURS))
    }

    /// Resolved snapshot directory
    pub fn cache_directory(&self) -> Result<PathBuf> {
        match &self.directory {
            Some(dir) => Ok(dir.clone()),
            None => default_cache_dir(),
        }
    }
}

fn hours_to_duration(hours: f64) -> Duration {
    Duration::milliseconds((hours * 3_600_000.0).round() as i64)
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is not set
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

/// Load configuration from multiple sources
pub fn load_config() -> Result<Config> {
    load_config_from(None)
}

/// Load configuration, optionally from an explicit file instead of the
/// global and project-local ones
pub fn load_config_from(explicit: Option<&Path>) -> Result<Config> {
    let mut figment = Figment::from(Serialized::defaults(Config::default()));

    if let Some(path) = explicit {
        if !path.exists() {
            anyhow::bail!("Config file not found: {}", path.display());
        }
        figment = figment.merge(Toml::file(path));
    } else {
        let global_config = get_config_dir()?.join("config.toml");
        if global_config.exists() {
            figment = figment.merge(Toml::file(&global_config));
        }

        let local_config = PathBuf::from(LOCAL_CONFIG_PATH);
        if local_config.exists() {
            figment = figment.merge(Toml::file(&local_config));
        }
    }

    // TREECACHE_CACHE__LIFETIME_HOURS=2 and friends
    figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

    figment
        .extract()
        .context("Failed to load configuration")
}

/// Get the configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    if let Some(proj_dirs) = ProjectDirs::from("", "", APP_NAME) {
        Ok(proj_dirs.config_dir().to_path_buf())
    } else {
        let home = home_dir()?;
        Ok(home.join(".config").join(APP_NAME))
    }
}

/// Default snapshot directory under the platform cache dir
pub fn default_cache_dir() -> Result<PathBuf> {
    if let Some(proj_dirs) = ProjectDirs::from("", "", APP_NAME) {
        Ok(proj_dirs.cache_dir().join(CACHE_SUBDIR))
    } else {
        let home = home_dir()?;
        Ok(home.join(".cache").join(APP_NAME).join(CACHE_SUBDIR))
    }
}

fn home_dir() -> Result<PathBuf> {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(PathBuf::from)
        .context("Could not determine home directory")
}

/// Save configuration to file
pub fn save_config(config: &Config, path: Option<PathBuf>) -> Result<PathBuf> {
    let path = match path {
        Some(p) => p,
        None => get_config_dir()?.join("config.toml"),
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let toml_string = toml::to_string_pretty(config)?;
    std::fs::write(&path, toml_string)
        .with_context(|| format!("Failed to write config to {}", path.display()))?;

    Ok(path)
}

/// Create a default configuration file if it doesn't exist
///
/// Returns the path when a file was written.
pub fn init_config(path: Option<PathBuf>) -> Result<Option<PathBuf>> {
    let path = match path {
        Some(p) => p,
        None => get_config_dir()?.join("config.toml"),
    };

    if path.exists() {
        return Ok(None);
    }

    save_config(&Config::default(), Some(path)).map(Some)
}
