//! Error types for elections-logstore
//!
//! This module defines the error types used throughout the log store.

use thiserror::Error;

/// Errors that can occur in log store operations
#[derive(Debug, Error)]
pub enum LogStoreError {
    /// I/O error on a log, index, or backup file
    #[error("I/O error: {0}")]
    Io(String),

    /// Failure while writing or reading a compressed backup generation
    #[error("Archive error: {0}")]
    Archive(String),

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// The persisted offset index contains something other than offsets
    #[error("Malformed index file {path} at line {line}: {detail}")]
    IndexFormat {
        path: String,
        line: usize,
        detail: String,
    },

    /// A scope string could not be parsed
    #[error("Invalid scope: {0}")]
    InvalidScope(String),

    /// A severity name could not be parsed
    #[error("Invalid severity: {0}")]
    InvalidSeverity(String),
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, LogStoreError>;

impl From<std::io::Error> for LogStoreError {
    fn from(err: std::io::Error) -> Self {
        LogStoreError::Io(err.to_string())
    }
}

impl From<zip::result::ZipError> for LogStoreError {
    fn from(err: zip::result::ZipError) -> Self {
        LogStoreError::Archive(err.to_string())
    }
}

impl From<toml::de::Error> for LogStoreError {
    fn from(err: toml::de::Error) -> Self {
        LogStoreError::Config(err.to_string())
    }
}

impl LogStoreError {
    /// Create a new I/O error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io(message.into())
    }

    /// Create a new Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a new InvalidScope error
    pub fn invalid_scope(input: impl Into<String>) -> Self {
        Self::InvalidScope(input.into())
    }

    /// Create a new InvalidSeverity error
    pub fn invalid_severity(input: impl Into<String>) -> Self {
        Self::InvalidSeverity(input.into())
    }
}
