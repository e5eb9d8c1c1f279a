//! Error taxonomy for factory operations.
//!
//! Every fallible library call returns [`Result`]. The binary wraps these
//! in `anyhow` at the CLI boundary.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the library.
pub type Result<T, E = FactoryError> = std::result::Result<T, E>;

/// Errors that can occur while running factory operations
#[derive(Debug, Error)]
pub enum FactoryError {
    /// A referenced user, directory, template or seed does not exist
    #[error("{what} not found: {}", path.display())]
    NotFound { what: String, path: PathBuf },

    /// The caller supplied a value the factory refuses to act on
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation log could not be read or written
    #[error("Storage error ({context}): {source}")]
    Storage {
        context: String,
        #[source]
        source: rusqlite::Error,
    },

    /// A filesystem operation failed
    #[error("IO error ({context}): {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// A step failed and the FAILED record for it could not be written.
    ///
    /// `original` is the step's own error; `log_error` is the store fault
    /// hit while recording it.
    #[error("{original} (failure record not written: {log_error})")]
    FailureNotRecorded {
        #[source]
        original: Box<FactoryError>,
        log_error: Box<FactoryError>,
    },
}

impl FactoryError {
    pub fn not_found(what: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::NotFound {
            what: what.into(),
            path: path.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// True for faults of the underlying store or filesystem
    pub fn is_storage_fault(&self) -> bool {
        match self {
            Self::Storage { .. } | Self::Io { .. } => true,
            Self::FailureNotRecorded { original, .. } => original.is_storage_fault(),
            _ => false,
        }
    }
}

/// Attach a human-readable context to lower-level errors.
///
/// Mirrors `anyhow::Context` for the two source errors the library wraps.
pub(crate) trait ResultExt<T> {
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|source| FactoryError::Io {
            context: f().into(),
            source,
        })
    }
}

impl<T> ResultExt<T> for std::result::Result<T, rusqlite::Error> {
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|source| FactoryError::Storage {
            context: f().into(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_fault_classification() {
        let io = FactoryError::Io {
            context: "write".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(io.is_storage_fault());
        assert!(!FactoryError::invalid("bad").is_storage_fault());
        assert!(!FactoryError::not_found("User directory", "/tmp/x").is_storage_fault());
    }

    #[test]
    fn test_failure_not_recorded_keeps_both_errors() {
        let err = FactoryError::FailureNotRecorded {
            original: Box::new(FactoryError::invalid("bad response")),
            log_error: Box::new(FactoryError::Config("store closed".to_string())),
        };

        let message = err.to_string();
        assert!(message.contains("bad response"));
        assert!(message.contains("store closed"));

        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "Invalid argument: bad response");
    }
}
