//! Tiered recovery orchestrator
//!
//! Every step recovers the same way:
//!
//! 1. **Cached**: non-empty results in the durable store win outright.
//! 2. **Live**: the live collaborator, while the attempt ceiling allows it.
//! 3. **Synthetic**: deterministic placeholders built from the normalized
//!    profile, memoized per session and persisted like real data.
//! 4. **`CriticalFallback`**: one minimal record when anything above fails
//!    or panics.
//!
//! Recovery never returns an error. The tier that produced the data is part
//! of the [`RecoveryOutcome`], and degraded tiers carry a [`StepIssue`].

use crate::context::ResilienceContext;
use crate::error::{RecoveryError, RecoveryResult};
use crate::live::LiveSearch;
use crate::policy::RecoveryPolicy;
use crate::step::{
    Notification, Notifier, Provenance, Severity, StepIssue, StepRecord, StepSink, WorkflowStep,
};
use crate::steps::{LiteratureStep, Publication, ReferenceDevice, ReferenceDeviceStep};
use crate::store::DurableStore;
use futures::FutureExt;
use rrl_profile::{DeviceProfile, IntegrityGuard};
use rrl_watchdog::Watchdog;
use serde::Serialize;
use serde_json::Value;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Which tier produced a step's data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryTier {
    /// Durable cache
    Cached,
    /// Live collaborator
    Live,
    /// Synthetic placeholders
    Synthetic,
    /// Absolute fallback
    CriticalFallback,
}

impl RecoveryTier {
    /// Whether the data is placeholder data
    #[inline]
    #[must_use]
    pub const fn is_degraded(self) -> bool {
        matches!(self, Self::Synthetic | Self::CriticalFallback)
    }
}

impl std::fmt::Display for RecoveryTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Cached => "cached",
            Self::Live => "live",
            Self::Synthetic => "synthetic",
            Self::CriticalFallback => "critical_fallback",
        };
        f.write_str(name)
    }
}

/// Result of one recovery call, mirrored into the step's sink
#[derive(Debug, Clone, Serialize)]
pub struct RecoveryOutcome<R> {
    /// Producing tier
    pub tier: RecoveryTier,
    /// Records handed to the sink, never empty
    pub records: Vec<R>,
    /// Selection handed to the sink
    pub selected: Option<R>,
    /// Issue handed to the sink
    pub issue: Option<StepIssue>,
    /// Attempt number of this call
    pub attempt: u32,
}

/// Per-step recovery entry points
pub struct RecoveryOrchestrator {
    context: Arc<ResilienceContext>,
    store: Arc<dyn DurableStore>,
    guard: IntegrityGuard,
    policy: RecoveryPolicy,
    watchdog: Option<Watchdog>,
}

impl RecoveryOrchestrator {
    /// Orchestrator over a session context and durable store
    #[must_use]
    pub fn new(context: Arc<ResilienceContext>, store: Arc<dyn DurableStore>) -> Self {
        Self {
            context,
            store,
            guard: IntegrityGuard::new(),
            policy: RecoveryPolicy::default(),
            watchdog: None,
        }
    }

    /// With recovery limits
    #[inline]
    #[must_use]
    pub fn with_policy(mut self, policy: RecoveryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// With profile guard
    #[inline]
    #[must_use]
    pub fn with_guard(mut self, guard: IntegrityGuard) -> Self {
        self.guard = guard;
        self
    }

    /// With a watchdog to alert from the critical tier
    #[inline]
    #[must_use]
    pub fn with_watchdog(mut self, watchdog: Watchdog) -> Self {
        self.watchdog = Some(watchdog);
        self
    }

    /// Session context
    #[inline]
    #[must_use]
    pub fn context(&self) -> &Arc<ResilienceContext> {
        &self.context
    }

    /// Durable store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<dyn DurableStore> {
        &self.store
    }

    /// Recovery limits
    #[inline]
    #[must_use]
    pub fn policy(&self) -> &RecoveryPolicy {
        &self.policy
    }

    /// Recover the reference device step
    pub async fn recover_reference_devices(
        &self,
        profile: Option<&DeviceProfile>,
        live: Option<&dyn LiveSearch<ReferenceDeviceStep>>,
        sink: &dyn StepSink<ReferenceDevice>,
        notifier: Option<&dyn Notifier>,
    ) -> RecoveryOutcome<ReferenceDevice> {
        self.recover::<ReferenceDeviceStep>(profile, live, sink, notifier).await
    }

    /// Recover the literature step
    pub async fn recover_literature(
        &self,
        profile: Option<&DeviceProfile>,
        live: Option<&dyn LiveSearch<LiteratureStep>>,
        sink: &dyn StepSink<Publication>,
        notifier: Option<&dyn Notifier>,
    ) -> RecoveryOutcome<Publication> {
        self.recover::<LiteratureStep>(profile, live, sink, notifier).await
    }

    /// Recover step `S`
    ///
    /// Always resolves with renderable data. The sink's loading flag is
    /// raised for the duration of the call and lowered on every path.
    pub async fn recover<S: WorkflowStep>(
        &self,
        profile: Option<&DeviceProfile>,
        live: Option<&dyn LiveSearch<S>>,
        sink: &dyn StepSink<S::Record>,
        notifier: Option<&dyn Notifier>,
    ) -> RecoveryOutcome<S::Record> {
        let attempt = self.context.next_attempt(S::NAME);
        set_loading(sink, S::NAME, true);
        let _loading = LoadingGuard {
            sink,
            step: S::NAME,
        };
        let notify = Notify {
            notifier,
            first_attempt: attempt == 1,
        };

        let tiers = AssertUnwindSafe(self.run_tiers::<S>(attempt, profile, live, sink, &notify))
            .catch_unwind()
            .await;

        let outcome = match tiers {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => self.critical::<S>(attempt, &err.to_string(), sink, &notify),
            Err(payload) => {
                self.critical::<S>(attempt, &panic_message(payload.as_ref()), sink, &notify)
            }
        };

        tracing::info!(
            step = S::NAME,
            attempt,
            tier = %outcome.tier,
            records = outcome.records.len(),
            "step recovered"
        );
        outcome
    }

    /// Persist an explicit user selection for step `S`
    ///
    /// Returns whether the selection reached the store.
    pub fn record_selection<S: WorkflowStep>(&self, record: &S::Record) -> bool {
        let key = S::selection_key();
        match serde_json::to_string(record) {
            Ok(raw) => self.write(S::NAME, &key, &raw),
            Err(err) => {
                tracing::warn!(step = S::NAME, error = %err, "selection not serializable");
                false
            }
        }
    }

    /// Drop step `S`'s cached results and selection
    pub fn invalidate<S: WorkflowStep>(&self) {
        self.forget(S::NAME, &S::results_key());
        self.forget(S::NAME, &S::selection_key());
        tracing::debug!(step = S::NAME, "step cache invalidated");
    }

    async fn run_tiers<S: WorkflowStep>(
        &self,
        attempt: u32,
        profile: Option<&DeviceProfile>,
        live: Option<&dyn LiveSearch<S>>,
        sink: &dyn StepSink<S::Record>,
        notify: &Notify<'_>,
    ) -> RecoveryResult<RecoveryOutcome<S::Record>> {
        if let Some(records) = self.load_cached::<S>() {
            let selected = self
                .load_selection::<S>()
                .or_else(|| records.first().cloned());
            tracing::debug!(step = S::NAME, attempt, count = records.len(), "durable cache hit");
            notify.send(
                format!("{} restored", S::LABEL),
                format!("Loaded {} saved record(s).", records.len()),
                Severity::Success,
            );
            return Ok(populate(sink, RecoveryTier::Cached, attempt, records, selected, None));
        }

        if let (Some(profile), Some(live)) = (profile, live) {
            if self.policy.allows_live(attempt) {
                if let Some(records) = fetch_live::<S>(profile, live).await {
                    self.persist::<S>(&records);
                    let selected = records.first().cloned();
                    notify.send(
                        format!("{} loaded", S::LABEL),
                        format!("Found {} record(s).", records.len()),
                        Severity::Success,
                    );
                    return Ok(populate(sink, RecoveryTier::Live, attempt, records, selected, None));
                }
            } else {
                tracing::debug!(
                    step = S::NAME,
                    attempt,
                    ceiling = self.policy.max_live_attempts,
                    "live attempts exhausted"
                );
            }
        }

        let records = self.synthetic::<S>(profile)?;
        self.persist::<S>(&records);
        let selected = records.first().cloned();
        let issue = StepIssue::warning(format!(
            "{} service is unavailable. Showing emergency placeholder data; replace it before submission.",
            S::LABEL
        ));
        tracing::warn!(step = S::NAME, attempt, "serving synthetic records");
        notify.send(
            format!("{} in emergency mode", S::LABEL),
            issue.message.clone(),
            Severity::Warning,
        );
        Ok(populate(
            sink,
            RecoveryTier::Synthetic,
            attempt,
            records,
            selected,
            Some(issue),
        ))
    }

    fn synthetic<S: WorkflowStep>(
        &self,
        profile: Option<&DeviceProfile>,
    ) -> RecoveryResult<Vec<S::Record>> {
        let memo_key = profile.map_or("", |profile| profile.id.as_str());
        if let Some(records) = self.context.memoized::<S::Record>(S::NAME, memo_key) {
            return Ok(records);
        }

        let normalized = match profile {
            Some(profile) => self.guard.repair_profile(profile)?,
            None => self.guard.repair(&Value::Null)?,
        };
        let mut records = S::synthesize(&normalized, self.policy.emergency_record_count)?;
        if records.is_empty() {
            return Err(RecoveryError::Synthesis {
                step: S::NAME,
                reason: "generator returned no records".to_string(),
            });
        }
        for record in &mut records {
            record.set_provenance(Provenance::emergency());
        }

        self.context.memoize(S::NAME, memo_key, records.clone());
        Ok(records)
    }

    fn critical<S: WorkflowStep>(
        &self,
        attempt: u32,
        reason: &str,
        sink: &dyn StepSink<S::Record>,
        notify: &Notify<'_>,
    ) -> RecoveryOutcome<S::Record> {
        tracing::error!(step = S::NAME, attempt, reason, "recovery failed, serving critical fallback");

        let mut record = S::critical_record();
        record.set_provenance(Provenance::critical());
        let records = vec![record];
        let selected = records.first().cloned();
        let issue = StepIssue::critical(format!(
            "{} could not be recovered ({reason}). A minimal placeholder is shown.",
            S::LABEL
        ));

        let populated = panic::catch_unwind(AssertUnwindSafe(|| {
            populate(
                sink,
                RecoveryTier::CriticalFallback,
                attempt,
                records.clone(),
                selected.clone(),
                Some(issue.clone()),
            )
        }));
        if populated.is_err() {
            tracing::warn!(step = S::NAME, "step sink panicked while applying critical fallback");
        }

        notify.send(
            format!("{} unavailable", S::LABEL),
            issue.message.clone(),
            Severity::Destructive,
        );
        if let Some(watchdog) = &self.watchdog {
            watchdog.perform_cleanup();
        }

        RecoveryOutcome {
            tier: RecoveryTier::CriticalFallback,
            records,
            selected,
            issue: Some(issue),
            attempt,
        }
    }

    fn load_cached<S: WorkflowStep>(&self) -> Option<Vec<S::Record>> {
        let key = S::results_key();
        let records: Vec<S::Record> = self.read(S::NAME, &key)?;
        (!records.is_empty()).then_some(records)
    }

    fn load_selection<S: WorkflowStep>(&self) -> Option<S::Record> {
        self.read(S::NAME, &S::selection_key())
    }

    fn persist<S: WorkflowStep>(&self, records: &[S::Record]) {
        match serde_json::to_string(records) {
            Ok(raw) => {
                self.write(S::NAME, &S::results_key(), &raw);
            }
            Err(err) => {
                tracing::warn!(step = S::NAME, error = %err, "results not serializable, cache skipped");
            }
        }
    }

    /// Read and decode `key`; unreadable or corrupt entries are removed
    fn read<T: serde::de::DeserializeOwned>(&self, step: &'static str, key: &str) -> Option<T> {
        let raw = match self.store.get(key) {
            Ok(raw) => raw?,
            Err(err) => {
                tracing::warn!(step, key, error = %err, "cache entry unreadable, removing");
                self.forget(step, key);
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(step, key, error = %err, "corrupt cache entry, removing");
                self.forget(step, key);
                None
            }
        }
    }

    fn write(&self, step: &'static str, key: &str, raw: &str) -> bool {
        match self.store.set(key, raw) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(step, key, error = %err, "cache write failed");
                false
            }
        }
    }

    fn forget(&self, step: &'static str, key: &str) {
        if let Err(err) = self.store.remove(key) {
            tracing::warn!(step, key, error = %err, "cache entry could not be removed");
        }
    }
}

impl std::fmt::Debug for RecoveryOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecoveryOrchestrator")
            .field("context", &self.context)
            .field("store", &self.store)
            .field("policy", &self.policy)
            .field("watchdog", &self.watchdog.is_some())
            .finish_non_exhaustive()
    }
}

async fn fetch_live<S: WorkflowStep>(
    profile: &DeviceProfile,
    live: &dyn LiveSearch<S>,
) -> Option<Vec<S::Record>> {
    let criteria = S::criteria(profile);
    match live.search(&criteria).await {
        Ok(records) if !records.is_empty() => Some(records),
        Ok(_) => {
            tracing::debug!(step = S::NAME, ?criteria, "live search returned nothing");
            None
        }
        Err(err) => {
            tracing::warn!(step = S::NAME, error = %format!("{err:#}"), "live search failed");
            None
        }
    }
}

fn populate<R: StepRecord>(
    sink: &dyn StepSink<R>,
    tier: RecoveryTier,
    attempt: u32,
    records: Vec<R>,
    selected: Option<R>,
    issue: Option<StepIssue>,
) -> RecoveryOutcome<R> {
    sink.set_results(&records);
    sink.set_selection(selected.as_ref());
    sink.set_issue(issue.as_ref());
    RecoveryOutcome {
        tier,
        records,
        selected,
        issue,
        attempt,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panic: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panic: {message}")
    } else {
        "panic".to_string()
    }
}

fn set_loading<R>(sink: &dyn StepSink<R>, step: &'static str, loading: bool) {
    if panic::catch_unwind(AssertUnwindSafe(|| sink.set_loading(loading))).is_err() {
        tracing::warn!(step, loading, "sink panicked while toggling loading");
    }
}

/// Lowers the loading flag on every exit path
struct LoadingGuard<'a, R> {
    sink: &'a dyn StepSink<R>,
    step: &'static str,
}

impl<R> Drop for LoadingGuard<'_, R> {
    fn drop(&mut self) {
        set_loading(self.sink, self.step, false);
    }
}

/// First-attempt-only notification gate
struct Notify<'a> {
    notifier: Option<&'a dyn Notifier>,
    first_attempt: bool,
}

impl Notify<'_> {
    fn send(&self, title: String, description: String, severity: Severity) {
        let Some(notifier) = self.notifier.filter(|_| self.first_attempt) else {
            return;
        };
        let notification = Notification {
            title,
            description,
            severity,
        };
        if panic::catch_unwind(AssertUnwindSafe(|| notifier.notify(&notification))).is_err() {
            tracing::warn!(title = %notification.title, "notifier panicked");
        }
    }
}
