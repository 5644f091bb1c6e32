use std::{fmt, io};

/// Crate-wide `Result` type using [`ExportError`] as the error.
///
/// This alias is re-exported by the parent `error` module and is intended
/// to be used throughout the crate for fallible operations.
pub type Result<T> = std::result::Result<T, ExportError>;

/// Top-level error type for export operations.
///
/// This type wraps more specific error kinds and provides a single
/// error type that can be used throughout the crate.
#[derive(Debug)]
pub enum ExportError {
    /// Export configuration errors (raised at registration, never retried).
    Config(ConfigError),

    /// Object name could not be decoded into chunk metadata.
    Name(NameError),

    /// Object storage errors.
    Storage(StorageError),

    /// Row source errors.
    Source(SourceError),

    /// Task dispatch and retry errors.
    Task(TaskError),

    /// A single attempt ran longer than its configured time limit.
    TimeLimitExceeded { table: String, limit_secs: u64 },

    /// I/O errors.
    Io(io::Error),

    /// MongoDB driver errors.
    MongoDb(mongodb::error::Error),

    /// Generic error with a free-form message.
    Generic(String),
}

/// Violations found while validating an export configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Chunk size is zero or negative.
    ChunkSizeNotPositive(i64),

    /// Chunk size is not a multiple of ten.
    ChunkSizeNotMultipleOfTen(i64),

    /// No field besides the identity field.
    NoFields,

    /// The same field is listed more than once.
    DuplicateFields(Vec<String>),

    /// Time limit outside `(0, 3600]` seconds.
    TimeLimitOutOfRange(i64),

    /// Retry count below zero.
    NegativeMaxRetries(i64),

    /// Retry countdown below zero.
    NegativeRetryCountdown(i64),

    /// Config file not found.
    FileNotFound(String),

    /// Invalid config format.
    InvalidFormat(String),

    /// Invalid field value.
    InvalidValue { field: String, value: String },
}

/// Errors decoding a storage object name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameError {
    /// Name does not follow `<table>/<ts>__<start>_<end>.csv`.
    MalformedName { name: String, reason: String },

    /// Metadata cannot be encoded (bad span or too narrow width).
    InvalidMetadata(String),
}

/// Object storage errors.
#[derive(Debug)]
pub enum StorageError {
    /// Object does not exist.
    NotFound(String),

    /// Listing a prefix failed.
    ListFailed { prefix: String, message: String },

    /// Reading an object failed.
    ReadFailed { name: String, message: String },

    /// Writing an object failed.
    WriteFailed { name: String, message: String },

    /// Deleting an object failed.
    DeleteFailed { name: String, message: String },
}

/// Row source errors.
#[derive(Debug)]
pub enum SourceError {
    /// Counting rows failed.
    CountFailed(String),

    /// Opening or paging a query failed.
    QueryFailed(String),
}

/// Task dispatch and retry errors.
#[derive(Debug)]
pub enum TaskError {
    /// A table was registered twice.
    DuplicateTableRegistration(String),

    /// No export is registered under the table name.
    UnknownTable(String),

    /// The attempt was cancelled before the source was exhausted.
    Cancelled { table: String },

    /// The configured retries are used up; the last error is attached.
    RetriesExhausted {
        table: String,
        attempts: u32,
        last_error: Box<ExportError>,
    },
}

impl ExportError {
    /// Whether the failure should be retried with the run timestamp carried forward.
    ///
    /// Every failure of an attempt is retried, except configuration and task
    /// errors, which no later attempt can fix.
    pub fn is_transient(&self) -> bool {
        !matches!(self, ExportError::Config(_) | ExportError::Task(_))
    }
}

impl ConfigError {
    /// Machine-readable name of the violated rule.
    pub fn rule(&self) -> &'static str {
        match self {
            ConfigError::ChunkSizeNotPositive(_) => "chunk_size_not_positive",
            ConfigError::ChunkSizeNotMultipleOfTen(_) => "chunk_size_not_multiple_of_ten",
            ConfigError::NoFields => "no_fields",
            ConfigError::DuplicateFields(_) => "duplicate_fields",
            ConfigError::TimeLimitOutOfRange(_) => "time_limit_out_of_range",
            ConfigError::NegativeMaxRetries(_) => "negative_max_retries",
            ConfigError::NegativeRetryCountdown(_) => "negative_retry_countdown",
            ConfigError::FileNotFound(_) => "file_not_found",
            ConfigError::InvalidFormat(_) => "invalid_format",
            ConfigError::InvalidValue { .. } => "invalid_value",
        }
    }
}

/* ========================= Display & Error impls ========================= */

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::Config(e) => write!(f, "Configuration error: {e}"),
            ExportError::Name(e) => write!(f, "{e}"),
            ExportError::Storage(e) => write!(f, "Storage error: {e}"),
            ExportError::Source(e) => write!(f, "Source error: {e}"),
            ExportError::Task(e) => write!(f, "{e}"),
            ExportError::TimeLimitExceeded { table, limit_secs } => {
                write!(f, "Export of '{table}' exceeded its time limit of {limit_secs}s")
            }
            ExportError::Io(e) => write!(f, "I/O error: {e}"),
            ExportError::MongoDb(e) => write!(f, "MongoDB error: {e}"),
            ExportError::Generic(msg) => write!(f, "{msg}"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = self.rule();
        match self {
            ConfigError::ChunkSizeNotPositive(n) => {
                write!(f, "{rule}: chunk size must be positive, got {n}")
            }
            ConfigError::ChunkSizeNotMultipleOfTen(n) => {
                write!(f, "{rule}: chunk size must be a multiple of 10, got {n}")
            }
            ConfigError::NoFields => {
                write!(f, "{rule}: at least one field besides the identity field is required")
            }
            ConfigError::DuplicateFields(dups) => {
                write!(f, "{rule}: fields listed more than once: {}", dups.join(", "))
            }
            ConfigError::TimeLimitOutOfRange(n) => {
                write!(f, "{rule}: time limit must be within 1..=3600 seconds, got {n}")
            }
            ConfigError::NegativeMaxRetries(n) => {
                write!(f, "{rule}: max retries must not be negative, got {n}")
            }
            ConfigError::NegativeRetryCountdown(n) => {
                write!(f, "{rule}: retry countdown must not be negative, got {n}")
            }
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {path}"),
            ConfigError::InvalidFormat(msg) => write!(f, "Invalid config format: {msg}"),
            ConfigError::InvalidValue { field, value } => {
                write!(f, "Invalid value '{value}' for field '{field}'")
            }
        }
    }
}

impl fmt::Display for NameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameError::MalformedName { name, reason } => {
                write!(f, "Malformed object name '{name}': {reason}")
            }
            NameError::InvalidMetadata(msg) => write!(f, "Invalid chunk metadata: {msg}"),
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::NotFound(name) => write!(f, "Object not found: {name}"),
            StorageError::ListFailed { prefix, message } => {
                write!(f, "Failed to list '{prefix}': {message}")
            }
            StorageError::ReadFailed { name, message } => {
                write!(f, "Failed to read '{name}': {message}")
            }
            StorageError::WriteFailed { name, message } => {
                write!(f, "Failed to write '{name}': {message}")
            }
            StorageError::DeleteFailed { name, message } => {
                write!(f, "Failed to delete '{name}': {message}")
            }
        }
    }
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::CountFailed(msg) => write!(f, "Row count failed: {msg}"),
            SourceError::QueryFailed(msg) => write!(f, "Query failed: {msg}"),
        }
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskError::DuplicateTableRegistration(table) => {
                write!(f, "Table '{table}' is already registered for export")
            }
            TaskError::UnknownTable(table) => {
                write!(f, "No export registered for table '{table}'")
            }
            TaskError::Cancelled { table } => write!(f, "Export of '{table}' was cancelled"),
            TaskError::RetriesExhausted {
                table,
                attempts,
                last_error,
            } => write!(
                f,
                "Export of '{table}' failed after {attempts} attempt(s): {last_error}"
            ),
        }
    }
}

impl std::error::Error for ExportError {}
impl std::error::Error for ConfigError {}
impl std::error::Error for NameError {}
impl std::error::Error for StorageError {}
impl std::error::Error for SourceError {}
impl std::error::Error for TaskError {}

/* ========================= Conversions to ExportError ========================= */

impl From<io::Error> for ExportError {
    fn from(err: io::Error) -> Self {
        ExportError::Io(err)
    }
}

impl From<mongodb::error::Error> for ExportError {
    fn from(err: mongodb::error::Error) -> Self {
        ExportError::MongoDb(err)
    }
}

impl From<ConfigError> for ExportError {
    fn from(err: ConfigError) -> Self {
        ExportError::Config(err)
    }
}

impl From<NameError> for ExportError {
    fn from(err: NameError) -> Self {
        ExportError::Name(err)
    }
}

impl From<StorageError> for ExportError {
    fn from(err: StorageError) -> Self {
        ExportError::Storage(err)
    }
}

impl From<SourceError> for ExportError {
    fn from(err: SourceError) -> Self {
        ExportError::Source(err)
    }
}

impl From<TaskError> for ExportError {
    fn from(err: TaskError) -> Self {
        ExportError::Task(err)
    }
}

impl From<String> for ExportError {
    fn from(msg: String) -> Self {
        ExportError::Generic(msg)
    }
}

impl From<&str> for ExportError {
    fn from(msg: &str) -> Self {
        ExportError::Generic(msg.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let storage: ExportError = StorageError::NotFound("users/x.csv".into()).into();
        assert!(storage.is_transient());

        let timeout = ExportError::TimeLimitExceeded {
            table: "users".into(),
            limit_secs: 10,
        };
        assert!(timeout.is_transient());

        let config: ExportError = ConfigError::NoFields.into();
        assert!(!config.is_transient());

        let name: ExportError = NameError::MalformedName {
            name: "users/oops".into(),
            reason: "missing suffix".into(),
        }
        .into();
        assert!(name.is_transient());

        let cancelled: ExportError = TaskError::Cancelled {
            table: "users".into(),
        }
        .into();
        assert!(!cancelled.is_transient());
    }

    #[test]
    fn test_config_error_display_names_rule() {
        let err = ConfigError::ChunkSizeNotMultipleOfTen(15);
        assert_eq!(err.rule(), "chunk_size_not_multiple_of_ten");
        assert!(err.to_string().starts_with("chunk_size_not_multiple_of_ten:"));
    }

    #[test]
    fn test_source_errors_are_transient() {
        for err in [
            SourceError::CountFailed("connection reset".into()),
            SourceError::QueryFailed("cursor killed".into()),
        ] {
            let message = err.to_string();
            let err: ExportError = err.into();
            assert!(err.is_transient());
            assert!(err.to_string().contains(&message));
        }
    }
}
