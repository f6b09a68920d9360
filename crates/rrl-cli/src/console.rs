//! Terminal collaborators for one-shot recoveries

use anyhow::Context as _;
use async_trait::async_trait;
use rrl_recovery::{LiveSearch, Notification, Notifier, Severity, StepIssue, StepSink, WorkflowStep};
use std::fmt::Debug;
use std::path::Path;

/// Sink that traces what a step would render
pub(crate) struct ConsoleSink;

impl<R: Debug + Send + Sync> StepSink<R> for ConsoleSink {
    fn set_results(&self, records: &[R]) {
        tracing::debug!(records = records.len(), "results set");
    }

    fn set_selection(&self, record: Option<&R>) {
        tracing::debug!(selection = ?record, "selection set");
    }

    fn set_loading(&self, loading: bool) {
        tracing::trace!(loading, "loading toggled");
    }

    fn set_issue(&self, issue: Option<&StepIssue>) {
        if let Some(issue) = issue {
            tracing::info!(kind = ?issue.kind, "{}", issue.message);
        }
    }
}

/// Notifier that writes toasts to the log
pub(crate) struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: &Notification) {
        match notification.severity {
            Severity::Success => {
                tracing::info!(title = %notification.title, "{}", notification.description);
            }
            Severity::Warning | Severity::Destructive => {
                tracing::warn!(title = %notification.title, "{}", notification.description);
            }
        }
    }
}

/// Live collaborator answering from a JSON file of records
pub(crate) struct FixtureSearch<S: WorkflowStep> {
    records: Vec<S::Record>,
}

impl<S: WorkflowStep> FixtureSearch<S> {
    pub(crate) fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading live fixture {}", path.display()))?;
        let records = serde_json::from_str(&raw)
            .with_context(|| format!("parsing {} records from {}", S::NAME, path.display()))?;
        Ok(Self { records })
    }
}

#[async_trait]
impl<S: WorkflowStep> LiveSearch<S> for FixtureSearch<S> {
    async fn search(&self, criteria: &S::Criteria) -> anyhow::Result<Vec<S::Record>> {
        tracing::debug!(step = S::NAME, ?criteria, "answering from fixture");
        Ok(self.records.clone())
    }
}
