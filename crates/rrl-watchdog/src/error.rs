//! Error types for the stability watchdog
//!
//! Probes and cleanup steps never propagate failures to the host; these
//! errors only surface from installation and scheduling calls.

/// Watchdog installation and scheduling errors
#[derive(Debug, thiserror::Error)]
pub enum WatchdogError {
    /// No tokio runtime to run timers on
    #[error("no async runtime available for watchdog timers")]
    NoRuntime,

    /// Periodic task registered with a zero period
    #[error("task '{0}' has a zero period")]
    ZeroPeriod(String),
}

/// Failure reported by a single probe tick
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// Host metric could not be read
    #[error("host metric unavailable: {0}")]
    MetricUnavailable(String),

    /// Probe-specific failure
    #[error("probe failed: {0}")]
    Failed(String),
}

/// Result type alias for watchdog operations
pub type WatchdogResult<T> = Result<T, WatchdogError>;
