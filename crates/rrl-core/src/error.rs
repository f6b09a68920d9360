//! Error types for RRL Core

use rrl_profile::IntegrityError;
use rrl_recovery::StoreError;
use rrl_watchdog::WatchdogError;
use std::path::PathBuf;

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("cannot read config {path}: {source}")]
    Io {
        /// Config file
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Config is not valid TOML for this schema
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config could not be rendered
    #[error("cannot render config: {0}")]
    Render(#[from] toml::ser::Error),

    /// A tunable is out of range
    #[error("invalid value for {field}: {reason}")]
    Invalid {
        /// Dotted field path
        field: &'static str,
        /// Why it was rejected
        reason: &'static str,
    },
}

/// Session construction and lifecycle errors
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Configuration rejected
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Durable store could not be opened
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Watchdog could not be installed
    #[error("watchdog error: {0}")]
    Watchdog(#[from] WatchdogError),

    /// Profile could not be normalized
    #[error("integrity error: {0}")]
    Integrity(#[from] IntegrityError),
}

/// Result type alias for session operations
pub type SessionResult<T> = Result<T, SessionError>;
