//! Error types for the ORM system
//!
//! Provides error handling for query building, context refinement,
//! relationship resolution and database execution.

use thiserror::Error;

/// Result type alias for model operations
pub type ModelResult<T> = Result<T, ModelError>;

/// ORM error type alias
pub type OrmError = ModelError;

/// ORM result type alias
pub type OrmResult<T> = ModelResult<T>;

/// Coarse classification of a [`ModelError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input rejected before any statement runs
    Validation,
    /// Failure reported by the database connection
    Database,
    /// Everything else (mapping, configuration, lookups)
    Other,
}

/// Error types for ORM operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    /// Generic validation failure
    #[error("Validation error: {0}")]
    Validation(String),

    /// Criteria value of an unsupported shape
    #[error("Invalid criteria: {0}")]
    InvalidCriteria(String),

    /// Sorting request outside the allow-list or malformed
    #[error("Invalid sorting: {0}")]
    InvalidSorting(String),

    /// Requested page size above the configured maximum
    #[error("Limit {limit} exceeds the configured maximum of {max}")]
    LimitExceeded { limit: u64, max: u64 },

    /// Operation requires a single-column primary key
    #[error("Composite primary key on table '{0}' is not supported here")]
    CompositePrimaryKey(String),

    /// Key value needed for a lookup is unset or zero
    #[error("Key '{column}' on table '{table}' is not set")]
    MissingKey { table: String, column: String },

    /// Database connection or query error
    #[error("Database error: {0}")]
    Database(String),

    /// Model not found in database
    #[error("Record not found in table '{0}'")]
    NotFound(String),

    /// Column missing from a result row
    #[error("Column '{0}' not found")]
    ColumnNotFound(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ModelError {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            ModelError::Validation(_)
            | ModelError::InvalidCriteria(_)
            | ModelError::InvalidSorting(_)
            | ModelError::LimitExceeded { .. }
            | ModelError::CompositePrimaryKey(_)
            | ModelError::MissingKey { .. } => ErrorKind::Validation,
            ModelError::Database(_) => ErrorKind::Database,
            ModelError::NotFound(_)
            | ModelError::ColumnNotFound(_)
            | ModelError::Serialization(_)
            | ModelError::Configuration(_) => ErrorKind::Other,
        }
    }

    /// Whether this is a validation-kind error
    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }
}

// Convert from sqlx errors
impl From<sqlx::Error> for ModelError {
    fn from(err: sqlx::Error) -> Self {
        ModelError::Database(err.to_string())
    }
}

// Convert from serde_json errors
impl From<serde_json::Error> for ModelError {
    fn from(err: serde_json::Error) -> Self {
        ModelError::Serialization(err.to_string())
    }
}
