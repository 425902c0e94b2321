//! Error types for confstore

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for confstore operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for confstore
#[derive(Error, Debug)]
pub enum Error {
    // -------------------------------------------------------------------------
    // Argument Errors (raised before any I/O)
    // -------------------------------------------------------------------------
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid configuration value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    // -------------------------------------------------------------------------
    // Validation Errors (security policy, raised before any query is built)
    // -------------------------------------------------------------------------
    #[error("Invalid identifier for {kind} '{name}': {reason}")]
    InvalidIdentifier {
        kind: &'static str,
        name: String,
        reason: String,
    },

    #[error("{what} for '{subject}' is {len} long, exceeding the maximum of {max}")]
    LimitExceeded {
        what: &'static str,
        subject: String,
        len: usize,
        max: usize,
    },

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Failed to serialize data: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to parse data: {0}")]
    Parse(String),

    // -------------------------------------------------------------------------
    // I/O Errors (file store)
    // -------------------------------------------------------------------------
    #[error("Failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create directory '{path}': {source}")]
    DirectoryCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // -------------------------------------------------------------------------
    // Backend Errors (propagated unchanged, never retried)
    // -------------------------------------------------------------------------
    #[cfg(any(feature = "postgres", feature = "mysql"))]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[cfg(feature = "redis")]
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid cache strategy: {0}")]
    InvalidCacheStrategy(String),

    // -------------------------------------------------------------------------
    // Runtime Errors (blocking wrappers)
    // -------------------------------------------------------------------------
    #[error("Blocking runtime error: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("Blocking call made from a current-thread async runtime; use the async API instead")]
    BlockingInAsync,
}

impl Error {
    /// Check if this error comes from argument or security validation
    #[must_use]
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidArgument(_)
                | Error::InvalidValue { .. }
                | Error::InvalidIdentifier { .. }
                | Error::LimitExceeded { .. }
        )
    }

    /// Check if this error was raised by a storage backend
    #[must_use]
    pub fn is_backend_error(&self) -> bool {
        match self {
            Error::FileRead { .. } | Error::FileWrite { .. } | Error::DirectoryCreate { .. } => {
                true
            }
            #[cfg(any(feature = "postgres", feature = "mysql"))]
            Error::Database(_) => true,
            #[cfg(feature = "redis")]
            Error::Redis(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_error_message() {
        let err = Error::InvalidIdentifier {
            kind: "table",
            name: "x;y".into(),
            reason: "contains disallowed characters".into(),
        };
        assert!(err.to_string().contains("Invalid identifier"));
        assert!(err.is_validation_error());
        assert!(!err.is_backend_error());
    }

    #[test]
    fn test_file_errors_are_backend_errors() {
        let err = Error::FileRead {
            path: PathBuf::from("/nope"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(err.is_backend_error());
        assert!(err.to_string().contains("/nope"));
    }
}
