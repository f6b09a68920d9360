//! Testing utilities for RRL workspace
//!
//! Shared fixtures, recording sinks and scripted live collaborators.

#![allow(missing_docs)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use rrl_core::{ResilienceConfig, ResilienceSession};
use rrl_profile::DeviceProfile;
use rrl_recovery::{
    LiveSearch, MemoryStore, Notification, Notifier, Provenance, Publication, ReferenceDevice,
    Severity, StepIssue, StepSink, WorkflowStep,
};
use rrl_watchdog::{ManualClock, NullHost, Watchdog, WatchdogConfig};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 4, 12, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

pub fn valid_profile() -> DeviceProfile {
    DeviceProfile::default_at(fixed_now())
        .with_name("CardioFlow Infusion Pump")
        .with_manufacturer("Acme Medical")
        .with_product_code("FRN")
        .with_device_class("II")
        .with_status("in_review")
}

pub fn partial_profile_json() -> Value {
    json!({
        "id": "device-partial",
        "name": "Glucose Monitor",
        "manufacturer": "  ",
        "structure": { "documentType": "510k", "sections": [] },
        "metadata": { "createdAt": "2025-11-02" },
        "owner": "regulatory-team"
    })
}

pub fn sample_reference_devices(count: usize) -> Vec<ReferenceDevice> {
    (0..count)
        .map(|index| ReferenceDevice {
            k_number: format!("K2{:05}", index + 1),
            device_name: format!("Predicate Pump {}", index + 1),
            manufacturer: "Predicate Corp".to_string(),
            product_code: "FRN".to_string(),
            device_class: "II".to_string(),
            decision_date: "2022-06-01".to_string(),
            match_score: 95,
            provenance: Provenance::real(),
        })
        .collect()
}

pub fn sample_publications(count: usize) -> Vec<Publication> {
    (0..count)
        .map(|index| Publication {
            id: format!("PMID-{}", 30_000 + index),
            title: format!("Infusion pump outcomes, cohort {}", index + 1),
            authors: vec!["Doe J".to_string(), "Roe R".to_string()],
            journal: "Device Letters".to_string(),
            year: 2021,
            summary: "Observational study.".to_string(),
            provenance: Provenance::real(),
        })
        .collect()
}

/// Watchdog on a manual clock with no host metrics and no panic hook
pub fn test_watchdog() -> (Watchdog, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let config = WatchdogConfig::default().with_panic_hook(false);
    let watchdog = Watchdog::with_parts(config, clock.clone(), Arc::new(NullHost));
    (watchdog, clock)
}

pub fn setup_test_session() -> ResilienceSession {
    let (watchdog, _) = test_watchdog();
    let config = ResilienceConfig::new().with_watchdog(watchdog.config().clone());
    ResilienceSession::with_parts(config, Arc::new(MemoryStore::new()), watchdog)
}

/// Step sink that remembers everything it was told
#[derive(Debug)]
pub struct RecordingSink<R> {
    results: Mutex<Vec<R>>,
    selection: Mutex<Option<R>>,
    loading: Mutex<Vec<bool>>,
    issue: Mutex<Option<StepIssue>>,
}

impl<R> Default for RecordingSink<R> {
    fn default() -> Self {
        Self {
            results: Mutex::new(Vec::new()),
            selection: Mutex::new(None),
            loading: Mutex::new(Vec::new()),
            issue: Mutex::new(None),
        }
    }
}

impl<R: Clone> RecordingSink<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn results(&self) -> Vec<R> {
        self.results.lock().clone()
    }

    pub fn selection(&self) -> Option<R> {
        self.selection.lock().clone()
    }

    pub fn issue(&self) -> Option<StepIssue> {
        self.issue.lock().clone()
    }

    /// Every loading toggle, in order
    pub fn loading_history(&self) -> Vec<bool> {
        self.loading.lock().clone()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.lock().last().copied().unwrap_or(false)
    }
}

impl<R: Clone + Send + Sync> StepSink<R> for RecordingSink<R> {
    fn set_results(&self, records: &[R]) {
        *self.results.lock() = records.to_vec();
    }

    fn set_selection(&self, record: Option<&R>) {
        *self.selection.lock() = record.cloned();
    }

    fn set_loading(&self, loading: bool) {
        self.loading.lock().push(loading);
    }

    fn set_issue(&self, issue: Option<&StepIssue>) {
        *self.issue.lock() = issue.cloned();
    }
}

/// Notifier that keeps every notification
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().clone()
    }

    pub fn severities(&self) -> Vec<Severity> {
        self.sent.lock().iter().map(|n| n.severity).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: &Notification) {
        self.sent.lock().push(notification.clone());
    }
}

/// Live collaborator returning a fixed answer
pub struct ScriptedSearch<S: WorkflowStep> {
    records: Vec<S::Record>,
    calls: AtomicUsize,
    last_criteria: Mutex<Option<Value>>,
}

impl<S: WorkflowStep> ScriptedSearch<S> {
    pub fn returning(records: Vec<S::Record>) -> Self {
        Self {
            records,
            calls: AtomicUsize::new(0),
            last_criteria: Mutex::new(None),
        }
    }

    pub fn empty() -> Self {
        Self::returning(Vec::new())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Criteria of the most recent call, as JSON
    pub fn last_criteria(&self) -> Option<Value> {
        self.last_criteria.lock().clone()
    }
}

#[async_trait]
impl<S: WorkflowStep> LiveSearch<S> for ScriptedSearch<S> {
    async fn search(&self, criteria: &S::Criteria) -> anyhow::Result<Vec<S::Record>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_criteria.lock() = serde_json::to_value(criteria).ok();
        Ok(self.records.clone())
    }
}

/// Live collaborator that is always down
pub struct FailingSearch {
    calls: AtomicUsize,
}

impl FailingSearch {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for FailingSearch {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<S: WorkflowStep> LiveSearch<S> for FailingSearch {
    async fn search(&self, _criteria: &S::Criteria) -> anyhow::Result<Vec<S::Record>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        anyhow::bail!("upstream unavailable: connection refused")
    }
}
