//! Error types for recovery
//!
//! None of these reach the caller of a recovery entry point: store errors
//! are logged and treated as a miss, everything else is caught by the
//! critical tier.

use rrl_profile::IntegrityError;
use std::path::PathBuf;

/// Durable store failure
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Filesystem operation failed
    #[error("store i/o failed at {path}: {source}")]
    Io {
        /// File or directory involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Backend refused the operation
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failure inside a recovery tier
#[derive(Debug, thiserror::Error)]
pub enum RecoveryError {
    /// Profile could not be normalized for synthesis
    #[error("profile integrity: {0}")]
    Integrity(#[from] IntegrityError),

    /// Synthetic generator failed
    #[error("synthesis failed for step '{step}': {reason}")]
    Synthesis {
        /// Step name
        step: &'static str,
        /// What went wrong
        reason: String,
    },

    /// Record (de)serialization failed
    #[error("record serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Durable store failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type alias for recovery internals
pub type RecoveryResult<T> = Result<T, RecoveryError>;
