//! Application-wide error types.
//!
//! Library modules use specific error types via `thiserror`, while
//! CLI/main uses `anyhow` for convenient error propagation.
//!
//! # Design
//!
//! - [`Error`]: Top-level application error enum
//! - [`StoreError`]: classified database failures, so a caller can tell a
//!   duplicate from a constraint failure from a lost connection
//! - All errors implement `std::error::Error` for compatibility
//!
//! # Example
//!
//! ```ignore
//! use rolas::error::{Error, Result};
//!
//! async fn ingest(store: &Store, path: &Path) -> Result<()> {
//!     let fields = reader.read(path)?;               // Metadata errors
//!     store.get_or_create_performer(&artist).await?; // Store errors auto-convert
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;

pub use crate::db::StoreError;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level application error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Database error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Tag reading error for a single file
    #[error("Metadata error for {path}: {message}")]
    Metadata { path: PathBuf, message: String },

    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Configuration or environment error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A background stage panicked or was cancelled
    #[error("Task failed: {0}")]
    Task(String),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create a metadata error.
    pub fn metadata(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Metadata {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a not found error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Add context to an error.
    pub fn context(self, ctx: impl Into<String>) -> Self {
        Self::WithContext {
            context: ctx.into(),
            source: Box::new(self),
        }
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Task(e.to_string())
    }
}

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn with_context(self, ctx: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(ctx))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, StoreError> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Store(e).context(ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::not_found("track 42");
        assert!(err.to_string().contains("track 42"));
    }

    #[test]
    fn test_error_with_context() {
        let err = Error::config("no home directory").context("while resolving scan root");
        let msg = err.to_string();
        assert!(msg.contains("while resolving scan root"));
        assert!(msg.contains("no home directory"));
    }

    #[test]
    fn test_metadata_error() {
        let err = Error::metadata("/music/song.mp3", "no tag");
        let msg = err.to_string();
        assert!(msg.contains("song.mp3"));
        assert!(msg.contains("no tag"));
    }

    #[test]
    fn test_store_error_converts() {
        let err: Error = StoreError::MissingReference {
            kind: "performer",
            id: 0,
        }
        .into();
        assert!(matches!(err, Error::Store(StoreError::MissingReference { .. })));
    }

    #[test]
    fn test_result_ext() {
        let result: Result<()> = Err(Error::config("test"));
        let with_ctx = result.with_context("additional context");
        assert!(with_ctx.unwrap_err().to_string().contains("additional context"));
    }
}
