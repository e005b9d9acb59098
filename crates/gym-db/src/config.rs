//! # Back-Office Configuration
//!
//! Loads the settings that drive the pool, shift folios, report windows and
//! logging.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     GYM_DB_PATH=./gym.db                                               │
//! │     GYM_FOLIO_PREFIX=CORTE                                             │
//! │     GYM_LOG=info,gym=debug                                             │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/gym-backoffice/backoffice.toml (Linux)                   │
//! │     ~/Library/Application Support/com.gym.backoffice/... (macOS)       │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "gym.db"
//! max_connections = 5
//! min_connections = 1
//! connect_timeout_secs = 30
//!
//! [shifts]
//! folio_prefix = "CORTE"
//!
//! [reports]
//! kardex_limit = 50
//!
//! [logging]
//! filter = "info,gym=debug,sqlx=warn"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use gym_core::{DEFAULT_FOLIO_PREFIX, DEFAULT_KARDEX_LIMIT};

use crate::pool::DbConfig;

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_database_path() -> PathBuf {
    directories::ProjectDirs::from("com", "gym", "backoffice")
        .map(|dirs| dirs.data_dir().join("gym.db"))
        .unwrap_or_else(|| PathBuf::from("gym.db"))
}

fn default_max_connections() -> u32 {
    5
}

fn default_min_connections() -> u32 {
    1
}

fn default_connect_timeout() -> u64 {
    30
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_database_path(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShiftSettings {
    /// Folio prefix, e.g. `CORTE` → `CORTE-20261017-001`.
    #[serde(default = "default_folio_prefix")]
    pub folio_prefix: String,
}

fn default_folio_prefix() -> String {
    DEFAULT_FOLIO_PREFIX.to_string()
}

impl Default for ShiftSettings {
    fn default() -> Self {
        ShiftSettings {
            folio_prefix: default_folio_prefix(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSettings {
    /// Movements shown on a kardex when the caller gives no limit.
    #[serde(default = "default_kardex_limit")]
    pub kardex_limit: u32,
}

fn default_kardex_limit() -> u32 {
    DEFAULT_KARDEX_LIMIT
}

impl Default for ReportSettings {
    fn default() -> Self {
        ReportSettings {
            kardex_limit: default_kardex_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_log_filter() -> String {
    "info,gym=debug,sqlx=warn".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        LoggingSettings {
            filter: default_log_filter(),
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackOfficeConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub shifts: ShiftSettings,

    #[serde(default)]
    pub reports: ReportSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

impl BackOfficeConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (`backoffice.toml`)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading back-office config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = Self::from_toml(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load back-office config: {}. Using defaults.", e);
            Self::default()
        })
    }

    pub fn from_toml(contents: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn to_toml(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let prefix = self.shifts.folio_prefix.trim();
        if prefix.is_empty() {
            return Err(ConfigError::Invalid("folio_prefix cannot be empty".into()));
        }
        if !prefix.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ConfigError::Invalid(format!(
                "folio_prefix must be alphanumeric, got: {}",
                prefix
            )));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "max_connections must be greater than 0".into(),
            ));
        }
        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigError::Invalid(
                "min_connections cannot exceed max_connections".into(),
            ));
        }

        if self.reports.kardex_limit == 0 {
            return Err(ConfigError::Invalid(
                "kardex_limit must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies `GYM_*` overrides read through `var`.
    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(path) = var("GYM_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(prefix) = var("GYM_FOLIO_PREFIX") {
            debug!(prefix = %prefix, "Overriding folio prefix from environment");
            self.shifts.folio_prefix = prefix;
        }

        if let Some(filter) = var("GYM_LOG") {
            self.logging.filter = filter;
        }
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "gym", "backoffice")
            .map(|dirs| dirs.config_dir().join("backoffice.toml"))
    }

    /// Pool configuration derived from the `[database]`, `[shifts]` and
    /// `[reports]` sections.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database.path)
            .max_connections(self.database.max_connections)
            .min_connections(self.database.min_connections)
            .connect_timeout(Duration::from_secs(self.database.connect_timeout_secs))
            .folio_prefix(self.shifts.folio_prefix.trim())
            .kardex_limit(self.reports.kardex_limit)
    }
}

// =============================================================================
// Logging
// =============================================================================

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` wins over `default_filter`. Calling this twice is harmless.
pub fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
