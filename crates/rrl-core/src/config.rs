//! Session configuration
//!
//! Every tunable of the layer in one TOML document:
//!
//! ```toml
//! [recovery]
//! max_live_attempts = 3
//! emergency_record_count = 3
//!
//! [watchdog]
//! freeze_threshold_ms = 5000
//! memory_limit_bytes = 314572800
//!
//! [store]
//! kind = "file"
//! dir = "/var/lib/rrl"
//! ```
//!
//! Missing sections and fields fall back to their defaults.

use crate::error::ConfigError;
use rrl_recovery::RecoveryPolicy;
use rrl_watchdog::WatchdogConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Where step results are persisted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreConfig {
    /// In-process only
    #[default]
    Memory,
    /// One directory per profile under `dir`
    File {
        /// Root directory
        dir: PathBuf,
    },
}

/// Complete layer configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    /// Recovery limits
    pub recovery: RecoveryPolicy,
    /// Watchdog tunables
    pub watchdog: WatchdogConfig,
    /// Durable store
    pub store: StoreConfig,
}

impl ResilienceConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With recovery limits
    #[inline]
    #[must_use]
    pub fn with_recovery(mut self, recovery: RecoveryPolicy) -> Self {
        self.recovery = recovery;
        self
    }

    /// With watchdog tunables
    #[inline]
    #[must_use]
    pub fn with_watchdog(mut self, watchdog: WatchdogConfig) -> Self {
        self.watchdog = watchdog;
        self
    }

    /// With durable store
    #[inline]
    #[must_use]
    pub fn with_store(mut self, store: StoreConfig) -> Self {
        self.store = store;
        self
    }

    /// Parse and validate a TOML document
    ///
    /// # Errors
    /// [`ConfigError::Parse`] for malformed TOML, [`ConfigError::Invalid`]
    /// for out-of-range values.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    ///
    /// # Errors
    /// See [`ResilienceConfig::from_toml_str`]; also [`ConfigError::Io`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&source)?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Render as TOML
    ///
    /// # Errors
    /// [`ConfigError::Render`] if serialization fails.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject values the layer cannot run with
    ///
    /// # Errors
    /// [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive: [(&'static str, u64); 4] = [
            ("watchdog.heartbeat_interval_ms", self.watchdog.heartbeat_interval_ms),
            ("watchdog.freeze_check_interval_ms", self.watchdog.freeze_check_interval_ms),
            ("watchdog.freeze_threshold_ms", self.watchdog.freeze_threshold_ms),
            ("watchdog.memory_probe_interval_ms", self.watchdog.memory_probe_interval_ms),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must be greater than zero",
                });
            }
        }

        if self.recovery.emergency_record_count == 0 {
            return Err(ConfigError::Invalid {
                field: "recovery.emergency_record_count",
                reason: "must be greater than zero",
            });
        }

        if let StoreConfig::File { dir } = &self.store {
            if dir.as_os_str().is_empty() {
                return Err(ConfigError::Invalid {
                    field: "store.dir",
                    reason: "must not be empty",
                });
            }
        }

        Ok(())
    }
}
