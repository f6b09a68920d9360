//! RRL Watchdog - Process-wide stability monitor
//!
//! Detects main-context stalls, memory pressure and error-rate spikes, and
//! answers each with a rate-limited cleanup pass that cancels timers, purges
//! caches, revokes temporary buffers and empties idle overlays. The watchdog
//! never lets a failure of its own escape into the host application.
//!
//! # Example
//!
//! ```rust,ignore
//! use rrl_watchdog::{Watchdog, WatchdogConfig};
//! use tracing_subscriber::prelude::*;
//!
//! let watchdog = Watchdog::new(WatchdogConfig::default());
//! tracing_subscriber::registry()
//!     .with(tracing_subscriber::fmt::layer())
//!     .with(watchdog.error_layer())
//!     .init();
//! watchdog.apply_patch()?;
//! ```

#![warn(unreachable_pub)]

pub mod cleanup;
pub mod clock;
pub mod config;
pub mod error;
pub mod host;
pub mod layer;
pub mod render_guard;
pub mod scheduler;
pub mod watchdog;

pub use cleanup::{CleanupRegistry, OverlayHost, Purgeable, RevocableBlob};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::WatchdogConfig;
pub use error::{ProbeError, WatchdogError, WatchdogResult};
pub use host::{HostEnvironment, NullHost, SysinfoHost};
pub use layer::ErrorRateLayer;
pub use render_guard::RenderGuard;
pub use scheduler::{Scheduler, TaskId, TaskInfo, TaskOwner};
pub use watchdog::{CleanupReport, HealthState, TripReason, Watchdog, WatchdogStatus};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
