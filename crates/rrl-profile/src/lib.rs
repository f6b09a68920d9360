//! RRL Profile - Device profile model and integrity guard
//!
//! Every workflow step consumes a [`DeviceProfile`]. Profiles arrive from the
//! form layer partial or malformed; the [`IntegrityGuard`] is the one place
//! allowed to repair them.
//!
//! # Example
//!
//! ```rust,ignore
//! use rrl_profile::IntegrityGuard;
//!
//! let guard = IntegrityGuard::new();
//! let profile = guard.repair(&serde_json::json!({ "name": "CardioFlow" }))?;
//! assert!(profile.validate().is_ok());
//! ```

#![warn(unreachable_pub)]

pub mod error;
pub mod guard;
pub mod profile;

pub use error::{IntegrityError, IntegrityResult};
pub use guard::{ClockFn, IntegrityGuard, RepairReport};
pub use profile::{AuditMetadata, DeviceProfile, ProfileId, ScalarField, StructuralDescriptor};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
