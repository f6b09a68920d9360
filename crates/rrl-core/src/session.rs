//! Resilience session
//!
//! Owns everything the layer keeps per workflow session: the recovery
//! context, the integrity guard, the watchdog, the durable store and the
//! orchestrator wired to all of them. Nothing here is global; two sessions
//! in one process do not share state.

use crate::config::{ResilienceConfig, StoreConfig};
use crate::error::SessionResult;
use rrl_profile::{DeviceProfile, IntegrityError, IntegrityGuard, ProfileId};
use rrl_recovery::{
    DurableStore, FileStore, LiteratureStep, MemoryStore, RecoveryOrchestrator,
    ReferenceDeviceStep, ResilienceContext, WorkflowStep,
};
use rrl_watchdog::{Purgeable, Watchdog, WatchdogStatus};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Step names the session reports on
pub const KNOWN_STEPS: [&str; 2] = [ReferenceDeviceStep::NAME, LiteratureStep::NAME];

/// Snapshot of session health
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    /// Watchdog record
    pub watchdog: WatchdogStatus,
    /// Recovery attempts per known step
    pub attempts: BTreeMap<&'static str, u32>,
}

/// Per-session owner of the resilience layer
pub struct ResilienceSession {
    config: ResilienceConfig,
    context: Arc<ResilienceContext>,
    guard: IntegrityGuard,
    watchdog: Watchdog,
    store: Arc<dyn DurableStore>,
    orchestrator: RecoveryOrchestrator,
}

impl ResilienceSession {
    /// Session with the store named by the config
    ///
    /// A file store is opened directly under its configured directory.
    ///
    /// # Errors
    /// Invalid config or a store directory that cannot be created.
    pub fn new(config: ResilienceConfig) -> SessionResult<Self> {
        config.validate()?;
        let store: Arc<dyn DurableStore> = match &config.store {
            StoreConfig::Memory => Arc::new(MemoryStore::new()),
            StoreConfig::File { dir } => Arc::new(FileStore::open(dir)?),
        };
        let watchdog = Watchdog::new(config.watchdog.clone());
        Ok(Self::with_parts(config, store, watchdog))
    }

    /// Session whose file store is scoped to one profile
    ///
    /// # Errors
    /// Invalid config or a store directory that cannot be created.
    pub fn for_profile(config: ResilienceConfig, profile: &ProfileId) -> SessionResult<Self> {
        config.validate()?;
        let store: Arc<dyn DurableStore> = match &config.store {
            StoreConfig::Memory => Arc::new(MemoryStore::new()),
            StoreConfig::File { dir } => Arc::new(FileStore::for_profile(dir, profile)?),
        };
        let watchdog = Watchdog::new(config.watchdog.clone());
        Ok(Self::with_parts(config, store, watchdog))
    }

    /// Session from explicit collaborators
    #[must_use]
    pub fn with_parts(
        config: ResilienceConfig,
        store: Arc<dyn DurableStore>,
        watchdog: Watchdog,
    ) -> Self {
        let context = Arc::new(ResilienceContext::new());
        let guard = IntegrityGuard::new();
        let orchestrator = RecoveryOrchestrator::new(Arc::clone(&context), Arc::clone(&store))
            .with_policy(config.recovery.clone())
            .with_guard(guard)
            .with_watchdog(watchdog.clone());

        Self {
            config,
            context,
            guard,
            watchdog,
            store,
            orchestrator,
        }
    }

    /// Install the watchdog
    ///
    /// Returns `Ok(false)` when it was already installed.
    ///
    /// # Errors
    /// [`crate::SessionError::Watchdog`] outside a tokio runtime.
    pub fn start(&self) -> SessionResult<bool> {
        Ok(self.watchdog.apply_patch()?)
    }

    /// Stop the watchdog's timers
    pub fn shutdown(&self) {
        self.watchdog.shutdown();
    }

    /// Repair a raw profile candidate
    ///
    /// # Errors
    /// [`IntegrityError`] if repair cannot produce a valid profile.
    pub fn normalize(&self, candidate: &Value) -> Result<DeviceProfile, IntegrityError> {
        self.guard.repair(candidate)
    }

    /// Let the watchdog purge a response cache during cleanup
    pub fn register_cache(&self, cache: Arc<dyn Purgeable>) {
        self.watchdog.registry().register_cache(cache);
    }

    /// Reset attempt counters and the synthetic memo
    pub fn reset(&self) {
        self.context.reset();
    }

    /// Watchdog record plus attempt counters
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            watchdog: self.watchdog.status(),
            attempts: KNOWN_STEPS
                .iter()
                .map(|step| (*step, self.context.attempts(step)))
                .collect(),
        }
    }

    /// Recovery entry points
    #[inline]
    #[must_use]
    pub fn orchestrator(&self) -> &RecoveryOrchestrator {
        &self.orchestrator
    }

    /// Recovery context
    #[inline]
    #[must_use]
    pub fn context(&self) -> &Arc<ResilienceContext> {
        &self.context
    }

    /// Stability watchdog
    #[inline]
    #[must_use]
    pub fn watchdog(&self) -> &Watchdog {
        &self.watchdog
    }

    /// Profile guard
    #[inline]
    #[must_use]
    pub fn guard(&self) -> &IntegrityGuard {
        &self.guard
    }

    /// Durable store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<dyn DurableStore> {
        &self.store
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ResilienceConfig {
        &self.config
    }
}

impl std::fmt::Debug for ResilienceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilienceSession")
            .field("config", &self.config)
            .field("context", &self.context)
            .field("watchdog", &self.watchdog)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SessionError;
    use rrl_watchdog::{ManualClock, NullHost, WatchdogConfig};
    use serde_json::json;

    fn memory_session() -> ResilienceSession {
        let config = ResilienceConfig::new()
            .with_watchdog(WatchdogConfig::default().with_panic_hook(false));
        let watchdog = Watchdog::with_parts(
            config.watchdog.clone(),
            Arc::new(ManualClock::new()),
            Arc::new(NullHost),
        );
        ResilienceSession::with_parts(config, Arc::new(MemoryStore::new()), watchdog)
    }

    #[test]
    fn status_lists_known_steps() {
        let session = memory_session();
        session.context().next_attempt(LiteratureStep::NAME);

        let status = session.status();

        assert_eq!(status.attempts.get("literature"), Some(&1));
        assert_eq!(status.attempts.get("reference_devices"), Some(&0));
        assert!(!status.watchdog.patch_applied);
    }

    #[test]
    fn reset_clears_attempts() {
        let session = memory_session();
        session.context().next_attempt(ReferenceDeviceStep::NAME);
        session.reset();
        assert_eq!(session.context().attempts(ReferenceDeviceStep::NAME), 0);
    }

    #[test]
    fn normalize_repairs_candidates() {
        let session = memory_session();
        let profile = session
            .normalize(&json!({ "name": "Stent", "structure": { "sections": [] } }))
            .unwrap();
        assert_eq!(profile.name, "Stent");
        assert!(!profile.structure.sections.is_empty());
    }

    #[test]
    fn file_store_is_scoped_per_profile() {
        let root = tempfile::tempdir().unwrap();
        let config = ResilienceConfig::new().with_store(StoreConfig::File {
            dir: root.path().to_path_buf(),
        });
        let profile = ProfileId("device-abc".to_string());

        let session = ResilienceSession::for_profile(config, &profile).unwrap();
        session.store().set("key", "value").unwrap();

        assert!(root.path().join("device-abc").is_dir());
    }

    #[test]
    fn start_needs_runtime() {
        let session = memory_session();
        assert!(matches!(session.start(), Err(SessionError::Watchdog(_))));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = ResilienceConfig::new().with_watchdog(WatchdogConfig {
            memory_probe_interval_ms: 0,
            ..WatchdogConfig::default()
        });
        assert!(matches!(ResilienceSession::new(config), Err(SessionError::Config(_))));
    }
}
