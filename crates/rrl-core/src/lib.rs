//! RRL Core - Resilience session
//!
//! Ties the layer together for one workflow session: configuration,
//! integrity guard, stability watchdog, durable store and the recovery
//! orchestrator, all owned by a [`ResilienceSession`].
//!
//! # Example
//!
//! ```rust,ignore
//! use rrl_core::{ResilienceConfig, ResilienceSession};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ResilienceConfig::load("rrl.toml")?;
//! let session = ResilienceSession::new(config)?;
//! session.start()?;
//!
//! let profile = session.normalize(&form_value)?;
//! let outcome = session
//!     .orchestrator()
//!     .recover_reference_devices(Some(&profile), Some(&client), &sink, Some(&toasts))
//!     .await;
//! println!("served from {}", outcome.tier);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod config;
pub mod error;
pub mod session;

pub use config::{ResilienceConfig, StoreConfig};
pub use error::{ConfigError, SessionError, SessionResult};
pub use session::{ResilienceSession, SessionStatus, KNOWN_STEPS};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for embedding the resilience layer
    pub use crate::{ResilienceConfig, ResilienceSession, StoreConfig};
    pub use rrl_profile::{DeviceProfile, IntegrityGuard};
    pub use rrl_recovery::{
        LiteratureStep, LiveSearch, Notifier, RecoveryOutcome, RecoveryTier, ReferenceDeviceStep,
        StepSink, WorkflowStep,
    };
    pub use rrl_watchdog::{Watchdog, WatchdogConfig};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
