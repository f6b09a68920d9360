//! Watchdog tunables
//!
//! Durations are stored in milliseconds so the config reads naturally from
//! TOML; accessors hand out [`Duration`]s.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Watchdog configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogConfig {
    /// Heartbeat timer period
    pub heartbeat_interval_ms: u64,
    /// Freeze check timer period
    pub freeze_check_interval_ms: u64,
    /// Heartbeat gap treated as a freeze
    pub freeze_threshold_ms: u64,
    /// Memory probe period
    pub memory_probe_interval_ms: u64,
    /// Heap usage that trips the memory probe
    pub memory_limit_bytes: u64,
    /// Errors tolerated before the error-rate probe trips
    pub error_threshold: u32,
    /// Minimum spacing between two cleanup runs
    pub cleanup_cooldown_ms: u64,
    /// Collection length the render guard lets through while degraded
    pub render_item_limit: usize,
    /// Chain a panic hook into the error-rate probe on install
    pub install_panic_hook: bool,
}

impl WatchdogConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With freeze threshold
    #[inline]
    #[must_use]
    pub fn with_freeze_threshold(mut self, threshold: Duration) -> Self {
        self.freeze_threshold_ms = duration_ms(threshold);
        self
    }

    /// With cleanup cooldown
    #[inline]
    #[must_use]
    pub fn with_cleanup_cooldown(mut self, cooldown: Duration) -> Self {
        self.cleanup_cooldown_ms = duration_ms(cooldown);
        self
    }

    /// With memory limit
    #[inline]
    #[must_use]
    pub fn with_memory_limit(mut self, bytes: u64) -> Self {
        self.memory_limit_bytes = bytes;
        self
    }

    /// With error threshold
    #[inline]
    #[must_use]
    pub fn with_error_threshold(mut self, threshold: u32) -> Self {
        self.error_threshold = threshold;
        self
    }

    /// With or without the chained panic hook
    #[inline]
    #[must_use]
    pub fn with_panic_hook(mut self, install: bool) -> Self {
        self.install_panic_hook = install;
        self
    }

    /// Heartbeat period
    #[inline]
    #[must_use]
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// Freeze check period
    #[inline]
    #[must_use]
    pub fn freeze_check_interval(&self) -> Duration {
        Duration::from_millis(self.freeze_check_interval_ms)
    }

    /// Freeze threshold
    #[inline]
    #[must_use]
    pub fn freeze_threshold(&self) -> Duration {
        Duration::from_millis(self.freeze_threshold_ms)
    }

    /// Memory probe period
    #[inline]
    #[must_use]
    pub fn memory_probe_interval(&self) -> Duration {
        Duration::from_millis(self.memory_probe_interval_ms)
    }

    /// Cleanup cooldown
    #[inline]
    #[must_use]
    pub fn cleanup_cooldown(&self) -> Duration {
        Duration::from_millis(self.cleanup_cooldown_ms)
    }
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: 2_000,
            freeze_check_interval_ms: 2_000,
            freeze_threshold_ms: 5_000,
            memory_probe_interval_ms: 10_000,
            memory_limit_bytes: 300 * 1024 * 1024,
            error_threshold: 10,
            cleanup_cooldown_ms: 10_000,
            render_item_limit: 100,
            install_panic_hook: true,
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
