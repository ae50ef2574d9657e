//! Error types for simpledb

use thiserror::Error;

/// Result type alias for simpledb operations
pub type DbResult<T> = Result<T, DbError>;

/// Error types for database operations
#[derive(Debug, Error)]
pub enum DbError {
    /// The caller passed an argument the operation cannot work with
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Database connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Statement preparation, parameter binding or execution failed
    #[error("Execution error: {0}")]
    Execution(#[from] tokio_postgres::Error),

    /// Row decode or record population error
    #[error("Mapping error on column '{column}': {message}")]
    Mapping { column: String, message: String },

    /// Missing or malformed configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DbError {
    /// Create an invalid argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Create a mapping error for a specific column
    pub fn mapping(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Mapping {
            column: column.into(),
            message: message.into(),
        }
    }

    /// SQLSTATE code reported by the server, if this is a server-side failure.
    pub fn sql_state(&self) -> Option<&str> {
        match self {
            Self::Execution(err) => err.as_db_error().map(|db| db.code().code()),
            _ => None,
        }
    }

    /// Check if this is a unique constraint violation
    pub fn is_unique_violation(&self) -> bool {
        self.sql_state() == Some("23505")
    }

    /// Check if this is a foreign key constraint violation
    pub fn is_foreign_key_violation(&self) -> bool {
        self.sql_state() == Some("23503")
    }

    /// Check if this is an invalid argument error
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }

    /// Check if this is a mapping error
    pub fn is_mapping(&self) -> bool {
        matches!(self, Self::Mapping { .. })
    }
}
