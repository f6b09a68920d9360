//! RRL Recovery - Tiered per-step recovery
//!
//! Each workflow step loads its data through the [`RecoveryOrchestrator`],
//! which tries the durable cache, then the live service, then synthetic
//! placeholders, and finally a single critical fallback record. Callers
//! always get renderable data back; [`RecoveryOutcome::tier`] says how good
//! it is.
//!
//! # Example
//!
//! ```rust,ignore
//! use rrl_recovery::{MemoryStore, RecoveryOrchestrator, ResilienceContext};
//! use std::sync::Arc;
//!
//! let orchestrator = RecoveryOrchestrator::new(
//!     Arc::new(ResilienceContext::new()),
//!     Arc::new(MemoryStore::new()),
//! );
//! let outcome = orchestrator
//!     .recover_literature(Some(&profile), Some(&client), &sink, None)
//!     .await;
//! ```

#![warn(unreachable_pub)]

pub mod context;
pub mod error;
pub mod live;
pub mod orchestrator;
pub mod policy;
pub mod step;
pub mod steps;
pub mod store;

pub use context::ResilienceContext;
pub use error::{RecoveryError, RecoveryResult, StoreError};
pub use live::{LiveSearch, MemoizedSearch};
pub use orchestrator::{RecoveryOrchestrator, RecoveryOutcome, RecoveryTier};
pub use policy::RecoveryPolicy;
pub use step::{
    IssueKind, Notification, Notifier, Provenance, Severity, StepIssue, StepRecord, StepSink,
    WorkflowStep,
};
pub use steps::{
    LiteratureQuery, LiteratureStep, Publication, ReferenceCriteria, ReferenceDevice,
    ReferenceDeviceStep,
};
pub use store::{DurableStore, FileStore, MemoryStore};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
