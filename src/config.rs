use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing_subscriber::filter::LevelFilter;

// =============================================================================
// Time-related constants
// =============================================================================

/// Default deadline for a whole batch resolution in milliseconds (30 seconds)
pub const DEFAULT_BATCH_TIMEOUT_MS: u64 = 30_000;

/// How long a connection waits on a locked database in milliseconds (5 seconds)
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

// =============================================================================
// Concurrency constants
// =============================================================================

/// Attempts at the latest-version determination before giving up
pub const DEFAULT_LATEST_RETRY_ATTEMPTS: u32 = 5;

/// Connections kept open to the catalog database
pub const DEFAULT_POOL_SIZE: usize = 4;

const APP_NAME: &str = "policy-catalog";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Catalog configuration structure
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct CatalogConfig {
    pub database: DatabaseConfig,
    pub resolution: ResolutionConfig,
    pub logging: LoggingConfig,
}

/// Database-related configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct DatabaseConfig {
    /// Database file; defaults to `catalog.db` in the data directory
    pub path: Option<PathBuf>,
    pub pool_size: usize,
    /// Busy timeout in milliseconds
    pub busy_timeout: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            pool_size: DEFAULT_POOL_SIZE,
            busy_timeout: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

/// Resolution-related configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ResolutionConfig {
    /// Batch resolution deadline in milliseconds
    pub batch_timeout: u64,
    pub latest_retry_attempts: u32,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            batch_timeout: DEFAULT_BATCH_TIMEOUT_MS,
            latest_retry_attempts: DEFAULT_LATEST_RETRY_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Console,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct LoggingConfig {
    /// Default level, overridden by `RUST_LOG`
    pub level: String,
    pub format: LogFormat,
    /// Write to the log file in the data directory instead of stderr
    pub file: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Console,
            file: false,
        }
    }
}

impl CatalogConfig {
    /// Load configuration from a JSON file, or the defaults when no file is given
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
                    path: path.to_path_buf(),
                    source,
                })?
            }
            None => Self::default(),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.pool_size == 0 {
            return Err(ConfigError::Invalid(
                "database.poolSize must be at least 1".to_string(),
            ));
        }
        if self.resolution.batch_timeout == 0 {
            return Err(ConfigError::Invalid(
                "resolution.batchTimeout must be greater than 0".to_string(),
            ));
        }
        if self.resolution.latest_retry_attempts == 0 {
            return Err(ConfigError::Invalid(
                "resolution.latestRetryAttempts must be at least 1".to_string(),
            ));
        }
        if self.logging.level.parse::<LevelFilter>().is_err() {
            return Err(ConfigError::Invalid(format!(
                "unknown logging.level: {}",
                self.logging.level
            )));
        }
        Ok(())
    }

    /// Database file to open
    pub fn db_path(&self) -> PathBuf {
        self.database.path.clone().unwrap_or_else(db_path)
    }
}

/// Returns the path to the data directory for policy-catalog.
/// Uses $XDG_DATA_HOME/policy-catalog if XDG_DATA_HOME is set,
/// otherwise falls back to ~/.local/share/policy-catalog,
/// or ./policy-catalog if neither is available.
pub fn data_dir() -> PathBuf {
    data_dir_with_env(std::env::var("XDG_DATA_HOME").ok(), dirs::home_dir())
}

/// Returns the path to the database file.
pub fn db_path() -> PathBuf {
    data_dir().join("catalog.db")
}

/// Returns the directory log files are written to.
pub fn log_dir() -> PathBuf {
    data_dir()
}

/// Returns the log file name within [`log_dir`].
pub fn log_file_name() -> &'static str {
    "policy-catalog.log"
}

fn data_dir_with_env(xdg_data_home: Option<String>, home_dir: Option<PathBuf>) -> PathBuf {
    let data_dir = xdg_data_home
        .map(PathBuf::from)
        .or_else(|| home_dir.map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));

    data_dir.join(APP_NAME)
}
