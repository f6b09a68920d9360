//! Stability watchdog
//!
//! One instance per session. Once installed it keeps three probes armed
//! (heartbeat, freeze check, memory) and listens on the diagnostic channel and
//! the panic hook for error spikes. Any tripped probe moves the session to
//! [`HealthState::Degraded`] and requests a cleanup pass; the session is
//! healthy again as soon as a pass completes.

use crate::cleanup::{isolate, CleanupRegistry};
use crate::clock::{Clock, SystemClock};
use crate::config::WatchdogConfig;
use crate::error::WatchdogError;
use crate::host::{HostEnvironment, SysinfoHost};
use crate::layer::ErrorRateLayer;
use crate::render_guard::RenderGuard;
use crate::scheduler::{Scheduler, TaskOwner};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

/// Session health
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    /// No probe tripped since the last cleanup
    Healthy,
    /// A probe tripped and no cleanup has completed since
    Degraded,
}

/// Why a probe tripped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TripReason {
    /// Heartbeat gap above the freeze threshold
    Freeze,
    /// Heap usage above the memory limit
    MemoryPressure,
    /// Error count above the error threshold
    ErrorRate,
    /// An error message mentioned memory exhaustion
    MemoryError,
}

/// Snapshot of the watchdog session record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchdogStatus {
    /// Whether the watchdog is installed
    pub patch_applied: bool,
    /// Cleanup passes run so far
    pub recovery_attempts: u64,
    /// Completion time of the last cleanup pass
    pub last_cleanup: Option<DateTime<Utc>>,
    /// Errors counted since the last error-rate reset
    pub error_count: u32,
    /// Current health
    pub health: HealthState,
    /// Periodic tasks currently armed
    pub active_tasks: usize,
}

/// What one cleanup pass did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    /// Timers cancelled in step 1
    pub timers_cancelled: usize,
    /// Whether the watchdog's own probes were re-armed
    pub probes_rearmed: bool,
    /// Caches purged
    pub caches_purged: usize,
    /// Blobs revoked
    pub blobs_released: usize,
    /// Idle overlays emptied
    pub overlays_cleared: usize,
    /// Whether the host accepted a GC hint
    pub gc_requested: bool,
    /// Steps that panicked or failed
    pub failed_steps: Vec<&'static str>,
}

#[derive(Debug, Default)]
struct CleanupState {
    last_started: Option<Instant>,
    last_completed: Option<DateTime<Utc>>,
    last_report: Option<CleanupReport>,
}

/// Process-health monitor that cleans up when a probe trips
///
/// Cheap to clone; clones share one session record.
#[derive(Clone)]
pub struct Watchdog {
    inner: Arc<WatchdogInner>,
}

pub(crate) struct WatchdogInner {
    me: Weak<WatchdogInner>,
    config: WatchdogConfig,
    clock: Arc<dyn Clock>,
    host: Arc<dyn HostEnvironment>,
    scheduler: Scheduler,
    registry: CleanupRegistry,
    render_guard: Arc<RenderGuard>,
    patch_applied: AtomicBool,
    degraded: AtomicBool,
    error_count: AtomicU32,
    recovery_attempts: AtomicU64,
    hook_installed: AtomicBool,
    last_alive: Mutex<Instant>,
    cleanup: Mutex<CleanupState>,
}

impl Watchdog {
    /// Watchdog on the system clock, reading this process's memory
    #[must_use]
    pub fn new(config: WatchdogConfig) -> Self {
        Self::with_parts(config, Arc::new(SystemClock), Arc::new(SysinfoHost::current()))
    }

    /// Watchdog with explicit clock and host
    #[must_use]
    pub fn with_parts(
        config: WatchdogConfig,
        clock: Arc<dyn Clock>,
        host: Arc<dyn HostEnvironment>,
    ) -> Self {
        let started = clock.now();
        let render_guard = Arc::new(RenderGuard::new(config.render_item_limit));

        let inner = Arc::new_cyclic(|me| WatchdogInner {
            me: me.clone(),
            config,
            clock,
            host,
            scheduler: Scheduler::new(),
            registry: CleanupRegistry::new(),
            render_guard,
            patch_applied: AtomicBool::new(false),
            degraded: AtomicBool::new(false),
            error_count: AtomicU32::new(0),
            recovery_attempts: AtomicU64::new(0),
            hook_installed: AtomicBool::new(false),
            last_alive: Mutex::new(started),
            cleanup: Mutex::new(CleanupState::default()),
        });

        Self { inner }
    }

    /// Install probes, hooks and the render guard
    ///
    /// Returns `Ok(false)` without side effects when already installed.
    ///
    /// # Errors
    /// [`WatchdogError::NoRuntime`] when called outside a tokio runtime; the
    /// watchdog stays uninstalled.
    pub fn apply_patch(&self) -> Result<bool, WatchdogError> {
        let inner = &self.inner;
        if inner.patch_applied.swap(true, Ordering::SeqCst) {
            tracing::debug!("stability watchdog already installed");
            return Ok(false);
        }

        let armed = inner
            .scheduler
            .attach_current()
            .and_then(|()| {
                inner.heartbeat();
                inner.arm_probes()
            });
        if let Err(err) = armed {
            inner.scheduler.cancel_owned_by(TaskOwner::Watchdog);
            inner.patch_applied.store(false, Ordering::SeqCst);
            return Err(err);
        }

        if inner.config.install_panic_hook && !inner.hook_installed.swap(true, Ordering::SeqCst) {
            install_panic_hook(inner.me.clone());
        }
        inner.render_guard.engage();

        tracing::info!(
            freeze_threshold_ms = inner.config.freeze_threshold_ms,
            memory_limit_bytes = inner.config.memory_limit_bytes,
            error_threshold = inner.config.error_threshold,
            "stability watchdog installed"
        );
        Ok(true)
    }

    /// Cancel the watchdog's timers and mark it uninstalled
    pub fn shutdown(&self) {
        let cancelled = self.inner.scheduler.cancel_owned_by(TaskOwner::Watchdog);
        self.inner.patch_applied.store(false, Ordering::SeqCst);
        self.inner.render_guard.release();
        tracing::info!(cancelled, "stability watchdog shut down");
    }

    /// Run a cleanup pass unless one ran within the cooldown
    ///
    /// Returns whether the pass ran.
    pub fn perform_cleanup(&self) -> bool {
        self.inner.perform_cleanup()
    }

    /// Record main-context liveness
    pub fn heartbeat(&self) {
        self.inner.heartbeat();
    }

    /// Run the freeze probe once; returns whether it tripped
    pub fn check_freeze(&self) -> bool {
        self.inner.check_freeze()
    }

    /// Run the memory probe once; returns whether it tripped
    pub fn check_memory(&self) -> bool {
        self.inner.check_memory()
    }

    /// Feed one error into the error-rate probe
    pub fn record_error(&self, message: &str) {
        self.inner.record_error(message);
    }

    /// Time since the last heartbeat
    #[must_use]
    pub fn since_heartbeat(&self) -> Duration {
        self.inner
            .clock
            .now()
            .saturating_duration_since(*self.inner.last_alive.lock())
    }

    /// Session record snapshot
    #[must_use]
    pub fn status(&self) -> WatchdogStatus {
        let inner = &self.inner;
        WatchdogStatus {
            patch_applied: inner.patch_applied.load(Ordering::SeqCst),
            recovery_attempts: inner.recovery_attempts.load(Ordering::SeqCst),
            last_cleanup: inner.cleanup.lock().last_completed,
            error_count: inner.error_count.load(Ordering::SeqCst),
            health: self.health(),
            active_tasks: inner.scheduler.len(),
        }
    }

    /// Current health
    #[must_use]
    pub fn health(&self) -> HealthState {
        if self.inner.degraded.load(Ordering::SeqCst) {
            HealthState::Degraded
        } else {
            HealthState::Healthy
        }
    }

    /// Report of the most recent cleanup pass
    #[must_use]
    pub fn last_cleanup_report(&self) -> Option<CleanupReport> {
        self.inner.cleanup.lock().last_report.clone()
    }

    /// Resources reclaimed by cleanup
    #[must_use]
    pub fn registry(&self) -> &CleanupRegistry {
        &self.inner.registry
    }

    /// Timers cancelled by cleanup
    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.inner.scheduler
    }

    /// Render-cost backstop
    #[must_use]
    pub fn render_guard(&self) -> Arc<RenderGuard> {
        Arc::clone(&self.inner.render_guard)
    }

    /// `tracing` layer feeding ERROR events into the error-rate probe
    #[must_use]
    pub fn error_layer(&self) -> ErrorRateLayer {
        ErrorRateLayer::new(Arc::downgrade(&self.inner))
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &WatchdogConfig {
        &self.inner.config
    }
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new(WatchdogConfig::default())
    }
}

impl std::fmt::Debug for Watchdog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watchdog")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl WatchdogInner {
    fn heartbeat(&self) {
        *self.last_alive.lock() = self.clock.now();
    }

    fn check_freeze(&self) -> bool {
        let now = self.clock.now();
        let gap = now.saturating_duration_since(*self.last_alive.lock());
        if gap <= self.config.freeze_threshold() {
            return false;
        }

        tracing::warn!(gap_ms = gap.as_millis(), "main context stalled");
        self.trip(TripReason::Freeze);
        self.heartbeat();
        true
    }

    fn check_memory(&self) -> bool {
        let Some(used) = self.host.heap_used_bytes() else {
            return false;
        };
        if used <= self.config.memory_limit_bytes {
            return false;
        }

        tracing::warn!(
            used_bytes = used,
            limit_bytes = self.config.memory_limit_bytes,
            "memory pressure"
        );
        self.trip(TripReason::MemoryPressure);
        true
    }

    pub(crate) fn record_error(&self, message: &str) {
        if IN_ERROR_HOOK.with(|flag| flag.replace(true)) {
            return;
        }
        let _reentry = HookReentry;

        let count = self.error_count.fetch_add(1, Ordering::SeqCst).saturating_add(1);
        if mentions_memory(message) {
            self.trip(TripReason::MemoryError);
        } else if count > self.config.error_threshold {
            self.error_count.store(0, Ordering::SeqCst);
            self.trip(TripReason::ErrorRate);
        }
    }

    fn trip(&self, reason: TripReason) {
        if !self.degraded.swap(true, Ordering::SeqCst) {
            tracing::warn!(?reason, "session degraded");
        }
        self.perform_cleanup();
    }

    fn perform_cleanup(&self) -> bool {
        let now = self.clock.now();
        {
            let mut state = self.cleanup.lock();
            if let Some(last) = state.last_started {
                if now.saturating_duration_since(last) < self.config.cleanup_cooldown() {
                    tracing::debug!("cleanup skipped, within cooldown");
                    return false;
                }
            }
            state.last_started = Some(now);
        }

        let attempt = self.recovery_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        let report = self.run_cleanup_steps();

        if report.failed_steps.is_empty() {
            tracing::info!(attempt, ?report, "cleanup completed");
        } else {
            tracing::warn!(attempt, failed = ?report.failed_steps, "cleanup completed with failures");
        }

        {
            let mut state = self.cleanup.lock();
            state.last_completed = Some(self.clock.wall());
            state.last_report = Some(report);
        }
        self.degraded.store(false, Ordering::SeqCst);
        true
    }

    fn run_cleanup_steps(&self) -> CleanupReport {
        let mut report = CleanupReport::default();

        match isolate("timers", || {
            let cancelled = self.scheduler.cancel_all();
            (cancelled, self.rearm_probes())
        }) {
            Some((cancelled, rearmed)) => {
                report.timers_cancelled = cancelled;
                report.probes_rearmed = rearmed;
            }
            None => report.failed_steps.push("timers"),
        }

        match isolate("caches", || self.registry.purge_caches()) {
            Some(purged) => report.caches_purged = purged,
            None => report.failed_steps.push("caches"),
        }

        match isolate("blobs", || self.registry.release_blobs()) {
            Some(released) => report.blobs_released = released,
            None => report.failed_steps.push("blobs"),
        }

        match isolate("overlays", || self.registry.clear_idle_overlays()) {
            Some(cleared) => report.overlays_cleared = cleared,
            None => report.failed_steps.push("overlays"),
        }

        match isolate("gc", || self.host.request_gc()) {
            Some(requested) => report.gc_requested = requested,
            None => report.failed_steps.push("gc"),
        }

        report
    }

    /// Re-arm probes after timers were cancelled; no-op while uninstalled
    fn rearm_probes(&self) -> bool {
        if !self.patch_applied.load(Ordering::SeqCst) || !self.scheduler.is_attached() {
            return false;
        }
        match self.arm_probes() {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(error = %err, "watchdog probes could not be re-armed");
                false
            }
        }
    }

    fn arm_probes(&self) -> Result<(), WatchdogError> {
        let me = self.me.clone();
        self.scheduler.every(
            "watchdog.heartbeat",
            TaskOwner::Watchdog,
            self.config.heartbeat_interval(),
            move || {
                if let Some(inner) = me.upgrade() {
                    inner.heartbeat();
                }
                Ok(())
            },
        )?;

        let me = self.me.clone();
        self.scheduler.every(
            "watchdog.freeze",
            TaskOwner::Watchdog,
            self.config.freeze_check_interval(),
            move || {
                if let Some(inner) = me.upgrade() {
                    inner.check_freeze();
                }
                Ok(())
            },
        )?;

        let me = self.me.clone();
        self.scheduler.every(
            "watchdog.memory",
            TaskOwner::Watchdog,
            self.config.memory_probe_interval(),
            move || {
                if let Some(inner) = me.upgrade() {
                    inner.check_memory();
                }
                Ok(())
            },
        )?;

        Ok(())
    }
}

thread_local! {
    // Set while this thread is inside `record_error`; errors logged by the
    // cleanup it triggers are not fed back in.
    static IN_ERROR_HOOK: Cell<bool> = const { Cell::new(false) };
}

struct HookReentry;

impl Drop for HookReentry {
    fn drop(&mut self) {
        IN_ERROR_HOOK.with(|flag| flag.set(false));
    }
}

fn mentions_memory(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    ["memory", "allocation", "heap"]
        .iter()
        .any(|needle| lower.contains(needle))
}

fn install_panic_hook(watchdog: Weak<WatchdogInner>) {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        if let Some(inner) = watchdog.upgrade() {
            if inner.patch_applied.load(Ordering::SeqCst) {
                inner.record_error(&info.to_string());
            }
        }
        previous(info);
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleanup::{Purgeable, RevocableBlob};
    use crate::clock::ManualClock;
    use crate::host::NullHost;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::AtomicUsize;
    use tracing_subscriber::layer::SubscriberExt;

    #[derive(Debug)]
    struct FakeHost {
        used: Mutex<Option<u64>>,
        gc_calls: AtomicUsize,
    }

    impl FakeHost {
        fn using(bytes: Option<u64>) -> Arc<Self> {
            Arc::new(Self {
                used: Mutex::new(bytes),
                gc_calls: AtomicUsize::new(0),
            })
        }
    }

    impl HostEnvironment for FakeHost {
        fn heap_used_bytes(&self) -> Option<u64> {
            *self.used.lock()
        }

        fn request_gc(&self) -> bool {
            self.gc_calls.fetch_add(1, Ordering::SeqCst);
            true
        }
    }

    struct CountingCache(AtomicUsize);

    impl Purgeable for CountingCache {
        fn label(&self) -> &str {
            "responses"
        }

        fn purge(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn config() -> WatchdogConfig {
        WatchdogConfig::default().with_panic_hook(false)
    }

    fn manual_watchdog() -> (Watchdog, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let watchdog = Watchdog::with_parts(config(), clock.clone(), Arc::new(NullHost));
        (watchdog, clock)
    }

    #[test]
    fn cleanup_is_rate_limited() {
        let (watchdog, clock) = manual_watchdog();
        let cache = Arc::new(CountingCache(AtomicUsize::new(0)));
        watchdog.registry().register_cache(cache.clone());

        assert!(watchdog.perform_cleanup());
        clock.advance(Duration::from_secs(3));
        assert!(!watchdog.perform_cleanup());
        assert_eq!(cache.0.load(Ordering::SeqCst), 1);
        assert_eq!(watchdog.status().recovery_attempts, 1);

        clock.advance(Duration::from_secs(7));
        assert!(watchdog.perform_cleanup());
        assert_eq!(cache.0.load(Ordering::SeqCst), 2);
        assert_eq!(watchdog.status().recovery_attempts, 2);
    }

    #[test]
    fn cleanup_records_completion_time() {
        let (watchdog, clock) = manual_watchdog();
        assert_eq!(watchdog.status().last_cleanup, None);

        clock.advance(Duration::from_secs(1));
        watchdog.perform_cleanup();

        assert_eq!(watchdog.status().last_cleanup, Some(clock.wall()));
    }

    #[test]
    fn freeze_gap_triggers_exactly_one_cleanup() {
        let (watchdog, clock) = manual_watchdog();
        watchdog.heartbeat();

        clock.advance(Duration::from_secs(6));
        assert!(watchdog.check_freeze());
        assert_eq!(watchdog.status().recovery_attempts, 1);
        assert_eq!(watchdog.since_heartbeat(), Duration::ZERO);

        assert!(!watchdog.check_freeze());
        clock.advance(Duration::from_secs(2));
        watchdog.heartbeat();
        assert!(!watchdog.check_freeze());
        assert_eq!(watchdog.status().recovery_attempts, 1);
        assert_eq!(watchdog.health(), HealthState::Healthy);
    }

    #[test]
    fn gap_at_threshold_is_not_a_freeze() {
        let (watchdog, clock) = manual_watchdog();
        watchdog.heartbeat();
        clock.advance(Duration::from_secs(5));
        assert!(!watchdog.check_freeze());
    }

    #[test]
    fn memory_probe_trips_above_limit() {
        let clock = Arc::new(ManualClock::new());
        let host = FakeHost::using(Some(400 * 1024 * 1024));
        let watchdog = Watchdog::with_parts(config(), clock, host.clone());

        assert!(watchdog.check_memory());
        assert_eq!(watchdog.status().recovery_attempts, 1);
        assert_eq!(host.gc_calls.load(Ordering::SeqCst), 1);
        assert!(watchdog.last_cleanup_report().unwrap().gc_requested);

        *host.used.lock() = Some(10 * 1024 * 1024);
        assert!(!watchdog.check_memory());
    }

    #[test]
    fn memory_probe_ignores_missing_metrics() {
        let (watchdog, _) = manual_watchdog();
        assert!(!watchdog.check_memory());
        assert_eq!(watchdog.status().recovery_attempts, 0);
    }

    #[test]
    fn error_spike_triggers_cleanup_and_resets_count() {
        let (watchdog, _) = manual_watchdog();

        for n in 0..10 {
            watchdog.record_error(&format!("request {n} failed"));
        }
        assert_eq!(watchdog.status().error_count, 10);
        assert_eq!(watchdog.status().recovery_attempts, 0);

        watchdog.record_error("request 11 failed");
        assert_eq!(watchdog.status().error_count, 0);
        assert_eq!(watchdog.status().recovery_attempts, 1);
    }

    #[test]
    fn memory_errors_trigger_cleanup_immediately() {
        let (watchdog, _) = manual_watchdog();

        watchdog.record_error("JavaScript heap out of memory");

        assert_eq!(watchdog.status().recovery_attempts, 1);
        assert_eq!(watchdog.status().error_count, 1);
    }

    struct BlockingCache(std::sync::Barrier);

    impl Purgeable for BlockingCache {
        fn label(&self) -> &str {
            "blocking"
        }

        fn purge(&self) {
            self.0.wait();
            self.0.wait();
        }
    }

    #[test]
    fn errors_from_other_threads_count_during_cleanup() {
        let (watchdog, _) = manual_watchdog();
        let cache = Arc::new(BlockingCache(std::sync::Barrier::new(2)));
        watchdog.registry().register_cache(cache.clone());

        std::thread::scope(|scope| {
            scope.spawn(|| watchdog.record_error("heap exhausted"));
            scope.spawn(|| {
                cache.0.wait();
                watchdog.record_error("upstream returned 502");
                cache.0.wait();
            });
        });

        assert_eq!(watchdog.status().error_count, 2);
        assert_eq!(watchdog.status().recovery_attempts, 1);
    }

    #[test]
    fn errors_logged_by_cleanup_are_not_fed_back() {
        struct LoudCache(Watchdog);

        impl Purgeable for LoudCache {
            fn label(&self) -> &str {
                "loud"
            }

            fn purge(&self) {
                self.0.record_error("purge failed");
            }
        }

        let (watchdog, _) = manual_watchdog();
        watchdog
            .registry()
            .register_cache(Arc::new(LoudCache(watchdog.clone())));

        watchdog.record_error("heap exhausted");

        assert_eq!(watchdog.status().error_count, 1);
        assert_eq!(watchdog.status().recovery_attempts, 1);
    }

    #[test]
    fn cleanup_runs_every_step() {
        let clock = Arc::new(ManualClock::new());
        let host = FakeHost::using(None);
        let watchdog = Watchdog::with_parts(config(), clock, host.clone());
        let cache = Arc::new(CountingCache(AtomicUsize::new(0)));
        let blob = RevocableBlob::new("export", vec![0_u8; 16]);
        watchdog.registry().register_cache(cache.clone());
        watchdog.registry().track_blob(&blob);

        assert!(watchdog.perform_cleanup());

        let report = watchdog.last_cleanup_report().unwrap();
        assert_eq!(
            report,
            CleanupReport {
                timers_cancelled: 0,
                probes_rearmed: false,
                caches_purged: 1,
                blobs_released: 1,
                overlays_cleared: 0,
                gc_requested: true,
                failed_steps: Vec::new(),
            }
        );
        assert!(blob.is_revoked());
    }

    #[test]
    fn error_layer_counts_only_errors() {
        let (watchdog, _) = manual_watchdog();
        let subscriber = tracing_subscriber::registry().with(watchdog.error_layer());

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!("slow response");
            tracing::error!(step = "literature", "live search failed");
            tracing::error!("render failed");
        });

        assert_eq!(watchdog.status().error_count, 2);
    }

    #[test]
    fn error_layer_spots_memory_fields() {
        let (watchdog, _) = manual_watchdog();
        let subscriber = tracing_subscriber::registry().with(watchdog.error_layer());

        tracing::subscriber::with_default(subscriber, || {
            tracing::error!(cause = "allocation failed", "export aborted");
        });

        assert_eq!(watchdog.status().recovery_attempts, 1);
    }

    #[test]
    fn apply_patch_requires_runtime() {
        let (watchdog, _) = manual_watchdog();
        assert!(matches!(watchdog.apply_patch(), Err(WatchdogError::NoRuntime)));
        assert!(!watchdog.status().patch_applied);
    }

    #[tokio::test]
    async fn apply_patch_is_idempotent() {
        let (watchdog, _) = manual_watchdog();

        assert!(watchdog.apply_patch().unwrap());
        assert!(!watchdog.apply_patch().unwrap());

        let status = watchdog.status();
        assert!(status.patch_applied);
        assert_eq!(status.active_tasks, 3);
        assert!(watchdog.render_guard().is_degraded());

        watchdog.shutdown();
        assert_eq!(watchdog.status().active_tasks, 0);
        assert!(!watchdog.status().patch_applied);
    }

    #[tokio::test(start_paused = true)]
    async fn cleanup_rearms_probes_and_heartbeat_resumes() {
        let (watchdog, clock) = manual_watchdog();
        watchdog.apply_patch().unwrap();
        watchdog
            .scheduler()
            .every("app.poll", TaskOwner::Application, Duration::from_secs(30), || Ok(()))
            .unwrap();

        clock.advance(Duration::from_secs(6));
        assert!(watchdog.check_freeze());

        let report = watchdog.last_cleanup_report().unwrap();
        assert_eq!(report.timers_cancelled, 4);
        assert!(report.probes_rearmed);
        assert_eq!(watchdog.status().active_tasks, 3);

        clock.advance(Duration::from_secs(1));
        assert_eq!(watchdog.since_heartbeat(), Duration::from_secs(1));
        tokio::time::sleep(Duration::from_millis(2_100)).await;
        tokio::task::yield_now().await;

        assert_eq!(watchdog.since_heartbeat(), Duration::ZERO);
        assert_eq!(watchdog.status().recovery_attempts, 1);
    }
}
