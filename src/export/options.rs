//! Export options and their validation
//!
//! [`ExportConfig`] is the raw, deserialized registration of one table (a
//! `[[exports]]` entry of the config file). [`ExportOptions`] is its validated,
//! immutable form. Validation happens once, when the export is registered.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Longest time a single attempt may run, in seconds.
pub const MAX_TIME_LIMIT_SECS: i64 = 3600;

/// How successive runs of a table relate to each other downstream
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Every run is loaded on top of the previous ones
    Append,
    /// Every run replaces the table's previous contents
    Overwrite,
}

/// Raw export registration as read from configuration
///
/// Numeric values are signed so that negative input can be reported by rule
/// instead of failing deserialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Table (or collection) to export
    pub table: String,

    /// Write mode
    pub mode: WriteMode,

    /// Rows per uploaded chunk
    #[serde(default = "default_chunk_size")]
    pub chunk_size: i64,

    /// Exported fields, in column order
    pub fields: Vec<String>,

    /// Field uniquely identifying a row
    #[serde(default = "default_identity_field")]
    pub identity_field: String,

    /// Explicit source ordering; the identity field when empty
    #[serde(default)]
    pub order_by: Vec<String>,

    /// Wall-clock limit of one attempt, in seconds
    #[serde(default = "default_time_limit")]
    pub time_limit: i64,

    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: i64,

    /// Delay before a retry, in seconds
    #[serde(default = "default_retry_countdown")]
    pub retry_countdown: i64,
}

fn default_chunk_size() -> i64 {
    10_000
}

fn default_identity_field() -> String {
    "id".to_string()
}

fn default_time_limit() -> i64 {
    600
}

fn default_max_retries() -> i64 {
    3
}

fn default_retry_countdown() -> i64 {
    60
}

impl ExportConfig {
    /// Create a raw registration with default limits
    pub fn new(table: impl Into<String>, mode: WriteMode, fields: Vec<String>) -> Self {
        Self {
            table: table.into(),
            mode,
            chunk_size: default_chunk_size(),
            fields,
            identity_field: default_identity_field(),
            order_by: Vec::new(),
            time_limit: default_time_limit(),
            max_retries: default_max_retries(),
            retry_countdown: default_retry_countdown(),
        }
    }
}

/// Validated, immutable export options for one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOptions {
    table: String,
    mode: WriteMode,
    chunk_size: u64,
    fields: Vec<String>,
    identity_field: String,
    order_by: Vec<String>,
    time_limit: Duration,
    max_retries: u32,
    retry_countdown: Duration,
}

impl ExportOptions {
    /// Validate a raw registration
    ///
    /// Appends the identity field to the field list when it is missing.
    ///
    /// # Errors
    /// The first violated rule, as a [`ConfigError`].
    pub fn validate(raw: ExportConfig) -> Result<Self, ConfigError> {
        let table = raw.table.trim().to_string();
        if table.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "table".into(),
                value: raw.table,
            });
        }
        let identity_field = raw.identity_field.trim().to_string();
        if identity_field.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "identity_field".into(),
                value: raw.identity_field,
            });
        }

        if raw.chunk_size <= 0 {
            return Err(ConfigError::ChunkSizeNotPositive(raw.chunk_size));
        }
        if raw.chunk_size % 10 != 0 {
            return Err(ConfigError::ChunkSizeNotMultipleOfTen(raw.chunk_size));
        }

        if !raw.fields.iter().any(|f| *f != identity_field) {
            return Err(ConfigError::NoFields);
        }
        let duplicates: BTreeSet<String> = {
            let mut seen = BTreeSet::new();
            raw.fields
                .iter()
                .filter(|f| !seen.insert(f.as_str()))
                .cloned()
                .collect()
        };
        if !duplicates.is_empty() {
            return Err(ConfigError::DuplicateFields(duplicates.into_iter().collect()));
        }

        if raw.time_limit <= 0 || raw.time_limit > MAX_TIME_LIMIT_SECS {
            return Err(ConfigError::TimeLimitOutOfRange(raw.time_limit));
        }
        if raw.max_retries < 0 {
            return Err(ConfigError::NegativeMaxRetries(raw.max_retries));
        }
        if raw.retry_countdown < 0 {
            return Err(ConfigError::NegativeRetryCountdown(raw.retry_countdown));
        }
        let max_retries = u32::try_from(raw.max_retries).map_err(|_| ConfigError::InvalidValue {
            field: "max_retries".into(),
            value: raw.max_retries.to_string(),
        })?;

        let mut fields = raw.fields;
        if !fields.contains(&identity_field) {
            fields.push(identity_field.clone());
        }

        // Identity breaks ties so the ordering is total and stable across attempts.
        let mut order_by = raw.order_by;
        if !order_by.contains(&identity_field) {
            order_by.push(identity_field.clone());
        }

        Ok(Self {
            table,
            mode: raw.mode,
            chunk_size: raw.chunk_size as u64,
            fields,
            identity_field,
            order_by,
            time_limit: Duration::from_secs(raw.time_limit as u64),
            max_retries,
            retry_countdown: Duration::from_secs(raw.retry_countdown as u64),
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn mode(&self) -> WriteMode {
        self.mode
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Exported fields, identity field included
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn identity_field(&self) -> &str {
        &self.identity_field
    }

    /// Source ordering, always ending in the identity field unless it was listed earlier
    pub fn order_by(&self) -> &[String] {
        &self.order_by
    }

    pub fn time_limit(&self) -> Duration {
        self.time_limit
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn retry_countdown(&self) -> Duration {
        self.retry_countdown
    }

    /// Whether the inventory is restricted to objects of the current run
    pub fn only_consider_current_run_objects(&self) -> bool {
        matches!(self.mode, WriteMode::Append)
    }

    /// Whether objects of other runs are deleted during reconciliation
    pub fn delete_foreign_run_objects(&self) -> bool {
        matches!(self.mode, WriteMode::Overwrite)
    }
}

impl TryFrom<ExportConfig> for ExportOptions {
    type Error = ConfigError;

    fn try_from(raw: ExportConfig) -> Result<Self, Self::Error> {
        Self::validate(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(fields: &[&str]) -> ExportConfig {
        ExportConfig::new(
            "users",
            WriteMode::Overwrite,
            fields.iter().map(|f| f.to_string()).collect(),
        )
    }

    fn rule(raw: ExportConfig) -> &'static str {
        ExportOptions::validate(raw).unwrap_err().rule()
    }

    #[test]
    fn test_identity_field_is_appended() {
        let opts = ExportOptions::validate(raw(&["name", "active"])).unwrap();
        assert_eq!(opts.fields(), ["name", "active", "id"]);
        assert_eq!(opts.order_by(), ["id"]);
    }

    #[test]
    fn test_identity_field_kept_in_place() {
        let opts = ExportOptions::validate(raw(&["id", "name"])).unwrap();
        assert_eq!(opts.fields(), ["id", "name"]);
    }

    #[test]
    fn test_explicit_order_gets_identity_tiebreak() {
        let mut cfg = raw(&["name"]);
        cfg.order_by = vec!["created_at".into()];
        let opts = ExportOptions::validate(cfg).unwrap();
        assert_eq!(opts.order_by(), ["created_at", "id"]);
    }

    #[test]
    fn test_chunk_size_rules() {
        let mut cfg = raw(&["name"]);
        cfg.chunk_size = 0;
        assert_eq!(rule(cfg.clone()), "chunk_size_not_positive");
        cfg.chunk_size = -10;
        assert_eq!(rule(cfg.clone()), "chunk_size_not_positive");
        cfg.chunk_size = 25;
        assert_eq!(rule(cfg), "chunk_size_not_multiple_of_ten");
    }

    #[test]
    fn test_field_rules() {
        assert_eq!(rule(raw(&[])), "no_fields");
        assert_eq!(rule(raw(&["id"])), "no_fields");
        assert_eq!(rule(raw(&["name", "name"])), "duplicate_fields");
    }

    #[test]
    fn test_limit_rules() {
        let mut cfg = raw(&["name"]);
        cfg.time_limit = 0;
        assert_eq!(rule(cfg.clone()), "time_limit_out_of_range");
        cfg.time_limit = 3601;
        assert_eq!(rule(cfg.clone()), "time_limit_out_of_range");
        cfg.time_limit = 3600;
        cfg.max_retries = -1;
        assert_eq!(rule(cfg.clone()), "negative_max_retries");
        cfg.max_retries = 0;
        cfg.retry_countdown = -5;
        assert_eq!(rule(cfg.clone()), "negative_retry_countdown");
        cfg.retry_countdown = 0;
        assert!(ExportOptions::validate(cfg).is_ok());
    }

    #[test]
    fn test_policy_flags_follow_mode() {
        let append = ExportOptions::validate(ExportConfig::new(
            "users",
            WriteMode::Append,
            vec!["name".into()],
        ))
        .unwrap();
        assert!(append.only_consider_current_run_objects());
        assert!(!append.delete_foreign_run_objects());

        let overwrite = ExportOptions::validate(raw(&["name"])).unwrap();
        assert!(!overwrite.only_consider_current_run_objects());
        assert!(overwrite.delete_foreign_run_objects());
    }

    #[test]
    fn test_deserialize_from_toml() {
        let cfg: ExportConfig = toml::from_str(
            r#"
            table = "orders"
            mode = "append"
            chunk_size = 500
            fields = ["total", "placed_at"]
            "#,
        )
        .unwrap();
        let opts = ExportOptions::validate(cfg).unwrap();
        assert_eq!(opts.mode(), WriteMode::Append);
        assert_eq!(opts.chunk_size(), 500);
        assert_eq!(opts.time_limit(), Duration::from_secs(600));
        assert_eq!(opts.max_retries(), 3);
        assert_eq!(opts.retry_countdown(), Duration::from_secs(60));
    }
}
