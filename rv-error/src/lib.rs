//! Unified error handling for Revisit
//!
//! This crate provides a single error type used across all Revisit components.
//! It uses thiserror for ergonomic error definitions with proper Display and Error trait impls.

use std::io;
use std::path::PathBuf;

/// Result type alias using RevisitError
pub type Result<T> = std::result::Result<T, RevisitError>;

/// Unified error type for all Revisit operations
#[derive(thiserror::Error, Debug)]
pub enum RevisitError {
    // ============================================================================
    // I/O and File System Errors
    // ============================================================================
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: io::Error,
    },

    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: io::Error,
    },

    #[error("Invalid path {path}: {reason}")]
    InvalidPath {
        path: PathBuf,
        reason: String,
    },

    // ============================================================================
    // Store Errors
    // ============================================================================
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Malformed store row {row}: {reason}")]
    MalformedRow {
        row: usize,
        reason: String,
    },

    // ============================================================================
    // Configuration and Settings Errors
    // ============================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidConfig {
        field: String,
        reason: String,
    },

    // ============================================================================
    // Submission Validation Errors
    // ============================================================================
    #[error("Submission is missing required attribute: {0}")]
    MissingAttribute(String),

    #[error("Invalid submission: {0}")]
    InvalidSubmission(String),

    #[error("Invalid capture name: {0}")]
    InvalidCaptureName(String),

    // ============================================================================
    // Daemon and IPC Errors
    // ============================================================================
    #[error("Daemon not available")]
    DaemonNotAvailable,

    #[error("Daemon connection failed: {0}")]
    DaemonConnection(String),

    #[error("Daemon request failed: {0}")]
    DaemonRequest(String),

    #[error("Daemon response error: {0}")]
    DaemonResponse(String),

    #[error("IPC protocol error: {0}")]
    IpcProtocol(String),

    #[error("Message too large: {size} bytes (max {max_size} bytes)")]
    MessageTooLarge {
        size: usize,
        max_size: usize,
    },

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Generic(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),
}

impl RevisitError {
    /// Create a generic error from a string
    pub fn generic(msg: impl Into<String>) -> Self {
        Self::Generic(msg.into())
    }

    /// Create a config error from a string
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid path error
    pub fn invalid_path(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid submission error
    pub fn invalid_submission(msg: impl Into<String>) -> Self {
        Self::InvalidSubmission(msg.into())
    }

    /// Create a daemon error from a string
    pub fn daemon(msg: impl Into<String>) -> Self {
        Self::DaemonRequest(msg.into())
    }

    /// True when the error was caused by the client's submission rather than the server
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::MissingAttribute(_) | Self::InvalidSubmission(_) | Self::InvalidCaptureName(_)
        )
    }
}

// Allow converting from String to RevisitError
impl From<String> for RevisitError {
    fn from(s: String) -> Self {
        Self::Generic(s)
    }
}

// Allow converting from &str to RevisitError
impl From<&str> for RevisitError {
    fn from(s: &str) -> Self {
        Self::Generic(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_attribute_display() {
        let err = RevisitError::MissingAttribute("CPU".into());
        assert_eq!(err.to_string(), "Submission is missing required attribute: CPU");
        assert!(err.is_client_error());
    }

    #[test]
    fn test_io_is_not_client_error() {
        let err: RevisitError = io::Error::new(io::ErrorKind::Other, "boom").into();
        assert!(!err.is_client_error());
    }
}
