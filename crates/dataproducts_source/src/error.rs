//! Error types for query sources.

use thiserror::Error;

/// Result type for source operations.
pub type Result<T> = std::result::Result<T, SourceError>;

/// Errors that can occur while streaming rows from a database.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The cursor has not been connected, or has been closed
    #[error("Query cursor is not connected")]
    NotConnected,

    /// Every row has been read
    ///
    /// This is a control signal, not a failure: callers stop reading.
    #[error("End of input")]
    EndOfInput,

    /// Opening the connection or starting the query failed
    #[error("Failed to connect: {0}")]
    Connection(String),

    /// PostgreSQL driver error
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// SQLite driver error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A column value could not be mapped to an attribute value
    #[error("Failed to decode column '{column}': {message}")]
    Decode {
        /// Column name
        column: String,
        /// What went wrong
        message: String,
    },

    /// Cancellation fired before the close completed
    #[error("Close cancelled before resources were released")]
    Cancelled,

    /// Invalid source configuration
    #[error("Invalid source configuration: {0}")]
    Configuration(String),
}

impl SourceError {
    /// Returns true for the end-of-input control signal.
    pub fn is_end_of_input(&self) -> bool {
        matches!(self, SourceError::EndOfInput)
    }

    /// Creates a new configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_end_of_input_is_a_signal() {
        assert!(SourceError::EndOfInput.is_end_of_input());
        assert!(!SourceError::NotConnected.is_end_of_input());
        assert!(!SourceError::Cancelled.is_end_of_input());
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            SourceError::configuration("dsn cannot be empty").to_string(),
            "Invalid source configuration: dsn cannot be empty"
        );
    }
}
