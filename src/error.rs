//! Error handling types for editlens
//!
//! This module provides the error type shared by the tracker, the projection
//! engine and the feature collaborators.

use std::sync::PoisonError;
use thiserror::Error;

/// Comprehensive error type for editlens operations
#[derive(Debug, Error)]
pub enum LensError {
    /// Document not open in the host
    #[error("Document not found: {uri}")]
    DocumentNotFound { uri: String },

    /// The primary editor owning a projection is gone
    #[error("Target editor is not opened anymore: {uri}")]
    PrimaryClosed { uri: String },

    /// A structural JSON path no longer resolves in the primary document
    #[error("Path \"{path}\" does not exist anymore in target document")]
    PathNotFound { path: String },

    /// A projected code block disappeared from the primary document
    #[error("Code block {id} does not exist anymore in target document")]
    BlockNotFound { id: String },

    /// JSON input could not be parsed
    #[error("JSON syntax error at byte {offset}: {message}")]
    JsonSyntax { offset: usize, message: String },

    /// Edit ranges overlap or fall outside the document
    #[error("Invalid edit: {message}")]
    InvalidEdit { message: String },

    /// More changed spans than a single rename may touch
    #[error("Cannot rename {count} tracked changes at once (limit is {limit})")]
    RenameFanOut { count: usize, limit: usize },

    /// Virtual file system operation that is not supported
    #[error("Operation not supported by the virtual file system: {operation}")]
    Unsupported { operation: String },

    /// Virtual file does not exist
    #[error("File not found: {uri}")]
    FileNotFound { uri: String },

    /// Configuration error
    #[error("Invalid configuration: {message}")]
    Config { message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for editlens operations
pub type LensResult<T> = Result<T, LensError>;

/// Helper trait to convert PoisonError to LensError
pub trait LockResultExt<T> {
    /// Convert a PoisonError to LensError with recovery and logging.
    ///
    /// The context parameter identifies which operation triggered lock recovery.
    fn recover_poison(self, context: &str) -> Result<T, LensError>;
}

impl<T> LockResultExt<T> for Result<T, PoisonError<T>> {
    fn recover_poison(self, context: &str) -> Result<T, LensError> {
        match self {
            Ok(guard) => Ok(guard),
            Err(poisoned) => {
                log::warn!(
                    target: "editlens::lock_recovery",
                    "Recovered from poisoned lock in {}",
                    context
                );
                Ok(poisoned.into_inner())
            }
        }
    }
}

/// Helper functions for common error patterns
impl LensError {
    /// Create a document not found error
    pub fn document_not_found(uri: impl Into<String>) -> Self {
        LensError::DocumentNotFound { uri: uri.into() }
    }

    /// Create an invalid edit error
    pub fn invalid_edit(message: impl Into<String>) -> Self {
        LensError::InvalidEdit {
            message: message.into(),
        }
    }

    /// Create an unsupported operation error
    pub fn unsupported(operation: impl Into<String>) -> Self {
        LensError::Unsupported {
            operation: operation.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        LensError::Config {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        LensError::Internal(message.into())
    }

    /// True for errors that reject a projection write without touching the primary.
    pub fn is_write_rejection(&self) -> bool {
        matches!(
            self,
            LensError::PrimaryClosed { .. }
                | LensError::PathNotFound { .. }
                | LensError::BlockNotFound { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn recover_poison_returns_inner_guard() {
        let lock = std::sync::Arc::new(Mutex::new(5));
        let cloned = lock.clone();
        let _ = std::thread::spawn(move || {
            let _guard = cloned.lock().unwrap();
            panic!("poison the lock");
        })
        .join();

        let guard = lock.lock().recover_poison("test").unwrap();
        assert_eq!(*guard, 5);
    }

    #[test]
    fn path_not_found_message_names_the_path() {
        let err = LensError::PathNotFound {
            path: "a/b".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Path \"a/b\" does not exist anymore in target document"
        );
        assert!(err.is_write_rejection());
    }

    #[test]
    fn fan_out_is_not_a_write_rejection() {
        let err = LensError::RenameFanOut { count: 3, limit: 2 };
        assert!(!err.is_write_rejection());
    }
}
