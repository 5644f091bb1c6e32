//! Configuration management for chunkport
//!
//! Configuration is read from a TOML file (default `~/.chunkport/config.toml`)
//! with the following sections:
//! - `[storage]`: where the bucket lives
//! - `[source]`: which database rows are read from
//! - `[logging]`: log level and timestamps
//! - `[[exports]]`: one export registration per table
//!
//! Command-line flags are applied on top of the file by [`crate::cli`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, Result, TaskError};
use crate::export::{ExportConfig, ExportOptions};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Bucket configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Source database configuration
    #[serde(default)]
    pub source: SourceConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Export registrations
    #[serde(default)]
    pub exports: Vec<ExportConfig>,
}

/// Bucket configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the bucket's objects
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
}

/// Source database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// MongoDB connection URI
    #[serde(default = "default_uri")]
    pub uri: String,

    /// Database holding the exported collections
    #[serde(default = "default_database")]
    pub database: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// Enable timestamps in logs
    #[serde(default = "default_log_timestamps")]
    pub timestamps: bool,
}

/// Log level options
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

fn default_storage_root() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".chunkport")
        .join("bucket")
}

fn default_uri() -> String {
    "mongodb://localhost:27017".to_string()
}

fn default_database() -> String {
    "test".to_string()
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

fn default_log_timestamps() -> bool {
    true
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            uri: default_uri(),
            database: default_database(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            timestamps: default_log_timestamps(),
        }
    }
}

impl AppConfig {
    /// Get the default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".chunkport")
            .join("config.toml")
    }

    /// Load configuration from a file
    ///
    /// An explicitly given path must exist. When no path is given the default
    /// path is tried, and a missing default file yields the default
    /// configuration.
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file (TOML format)
    ///
    /// # Returns
    /// * `Result<AppConfig>` - Loaded configuration or error
    pub fn load_from_file(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (Self::default_config_path(), false),
        };

        if !path.exists() {
            if explicit {
                return Err(ConfigError::FileNotFound(path.display().to_string()).into());
            }
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ConfigError::InvalidFormat(e.to_string()).into())
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::InvalidFormat(e.to_string()).into())
    }

    /// Validate the configuration
    ///
    /// Every export registration is validated; duplicate tables are rejected.
    ///
    /// # Returns
    /// * `Result<Vec<ExportOptions>>` - Validated options in file order
    pub fn validate(&self) -> Result<Vec<ExportOptions>> {
        if self.source.database.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "source.database".to_string(),
                value: self.source.database.clone(),
            }
            .into());
        }

        let mut validated: Vec<ExportOptions> = Vec::with_capacity(self.exports.len());
        for raw in &self.exports {
            let options = ExportOptions::validate(raw.clone())?;
            if validated.iter().any(|o| o.table() == options.table()) {
                return Err(
                    TaskError::DuplicateTableRegistration(options.table().to_string()).into(),
                );
            }
            validated.push(options);
        }
        Ok(validated)
    }

    /// Export registration of `table`
    pub fn export(&self, table: &str) -> Option<&ExportConfig> {
        self.exports.iter().find(|e| e.table == table)
    }
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}
