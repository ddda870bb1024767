//! Error types for the userdb library
//!
//! This module defines the error taxonomy used throughout the library,
//! covering argument validation, file access, record lookup, and the
//! oversized-line guard of the record store.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for userdb operations
#[derive(Error, Debug)]
pub enum UserDbError {
    /// Null/empty/malformed input, including record fields that contain
    /// the delimiter character
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// A database file could not be opened or locked
    #[error("Access denied: {path}")]
    AccessDenied { path: PathBuf },

    /// Account creation attempted for a name that already has a record
    #[error("Account already exists: {name}")]
    AlreadyExists { name: String },

    /// Operation on a name with no matching record
    #[error("Account not found: {name}")]
    NotFound { name: String },

    /// A line in a database file exceeds the configured bound
    #[error("Record too long: {actual} bytes (maximum {limit})")]
    RecordTooLong { limit: usize, actual: usize },

    /// Unexpected read/write/rename failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation failure
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl UserDbError {
    /// Shorthand for an `InvalidArgument` error
    pub fn invalid(message: impl Into<String>) -> Self {
        UserDbError::InvalidArgument {
            message: message.into(),
        }
    }
}

/// Result type alias for userdb operations
pub type UserDbResult<T> = Result<T, UserDbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = UserDbError::NotFound {
            name: "alice".to_string(),
        };
        assert_eq!(err.to_string(), "Account not found: alice");

        let err = UserDbError::AccessDenied {
            path: PathBuf::from("/etc/passwd"),
        };
        assert_eq!(err.to_string(), "Access denied: /etc/passwd");

        let err = UserDbError::RecordTooLong {
            limit: 1024,
            actual: 2048,
        };
        assert_eq!(err.to_string(), "Record too long: 2048 bytes (maximum 1024)");
    }

    #[test]
    fn test_io_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
        let err: UserDbError = io_err.into();
        assert!(matches!(err, UserDbError::Io(_)));
    }
}
