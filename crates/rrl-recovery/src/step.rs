//! Workflow step contract
//!
//! A step names its records, its search criteria and how to fabricate
//! placeholders. The orchestrator does everything else the same way for
//! every step.

use crate::error::RecoveryError;
use rrl_profile::DeviceProfile;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Provenance flags carried by every step record
///
/// Serialized flat into the record; flags are omitted while false.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Provenance {
    /// Record was synthesized, not retrieved
    #[serde(default, skip_serializing_if = "is_false")]
    pub emergency_data: bool,
    /// Record comes from the absolute fallback tier
    #[serde(default, skip_serializing_if = "is_false")]
    pub critical_recovery: bool,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_false(flag: &bool) -> bool {
    !*flag
}

impl Provenance {
    /// Retrieved record
    #[inline]
    #[must_use]
    pub const fn real() -> Self {
        Self {
            emergency_data: false,
            critical_recovery: false,
        }
    }

    /// Synthetic placeholder
    #[inline]
    #[must_use]
    pub const fn emergency() -> Self {
        Self {
            emergency_data: true,
            critical_recovery: false,
        }
    }

    /// Absolute fallback placeholder
    #[inline]
    #[must_use]
    pub const fn critical() -> Self {
        Self {
            emergency_data: true,
            critical_recovery: true,
        }
    }

    /// Whether the record is real evidence
    #[inline]
    #[must_use]
    pub const fn is_real(self) -> bool {
        !self.emergency_data && !self.critical_recovery
    }
}

/// A record that knows where it came from
pub trait StepRecord: Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Provenance flags
    fn provenance(&self) -> Provenance;

    /// Overwrite provenance flags
    fn set_provenance(&mut self, provenance: Provenance);
}

/// One workflow step's recovery parameters
pub trait WorkflowStep: Send + Sync + 'static {
    /// Stable step name, used in cache keys and counters
    const NAME: &'static str;

    /// Human-readable label used in notifications
    const LABEL: &'static str;

    /// Result record
    type Record: StepRecord;

    /// Live search criteria
    type Criteria: Debug + Serialize + Send + Sync;

    /// Durable key holding the step's result list
    #[must_use]
    fn results_key() -> String {
        format!("rrl.{}.results", Self::NAME)
    }

    /// Durable key holding the user's explicit selection
    #[must_use]
    fn selection_key() -> String {
        format!("rrl.{}.selection", Self::NAME)
    }

    /// Best-effort criteria from the current profile
    fn criteria(profile: &DeviceProfile) -> Self::Criteria;

    /// Deterministic placeholders for a normalized profile
    ///
    /// # Errors
    /// [`RecoveryError::Synthesis`] when no records can be produced.
    fn synthesize(profile: &DeviceProfile, count: usize) -> Result<Vec<Self::Record>, RecoveryError>;

    /// Minimal record for the absolute fallback; must not fail
    fn critical_record() -> Self::Record;
}

/// Workflow state setters for one step
///
/// Implementations use interior mutability; the orchestrator only borrows
/// the sink for the duration of a call.
pub trait StepSink<R>: Send + Sync {
    /// Replace the result list
    fn set_results(&self, records: &[R]);

    /// Replace the current selection
    fn set_selection(&self, record: Option<&R>);

    /// Toggle the loading indicator
    fn set_loading(&self, loading: bool);

    /// Replace the step's issue banner
    fn set_issue(&self, issue: Option<&StepIssue>);
}

/// Severity of a user notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Data available
    Success,
    /// Degraded but usable
    Warning,
    /// Recovery failed, placeholder shown
    Destructive,
}

/// User-facing notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Short title
    pub title: String,
    /// One-sentence description
    pub description: String,
    /// Severity
    pub severity: Severity,
}

/// Notification channel
pub trait Notifier: Send + Sync {
    /// Deliver one notification
    fn notify(&self, notification: &Notification);
}

/// Issue level shown next to a step's data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Placeholder data, service unavailable
    Warning,
    /// Recovery itself failed
    Critical,
}

/// Structured issue accompanying degraded data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepIssue {
    /// Level
    #[serde(rename = "type")]
    pub kind: IssueKind,
    /// Explanation for the user
    pub message: String,
}

impl StepIssue {
    /// Warning-level issue
    #[must_use]
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            kind: IssueKind::Warning,
            message: message.into(),
        }
    }

    /// Critical-level issue
    #[must_use]
    pub fn critical(message: impl Into<String>) -> Self {
        Self {
            kind: IssueKind::Critical,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Row {
        id: u32,
        #[serde(flatten)]
        provenance: Provenance,
    }

    #[test]
    fn real_provenance_is_not_serialized() {
        let row = Row {
            id: 1,
            provenance: Provenance::real(),
        };
        assert_eq!(serde_json::to_value(&row).unwrap(), json!({ "id": 1 }));
    }

    #[test]
    fn critical_provenance_sets_both_flags() {
        let row = Row {
            id: 1,
            provenance: Provenance::critical(),
        };
        assert_eq!(
            serde_json::to_value(&row).unwrap(),
            json!({ "id": 1, "emergency_data": true, "critical_recovery": true })
        );

        let parsed: Row = serde_json::from_value(json!({ "id": 2, "emergency_data": true })).unwrap();
        assert_eq!(parsed.provenance, Provenance::emergency());
        assert!(!parsed.provenance.is_real());
    }

    #[test]
    fn issue_serializes_type_tag() {
        let issue = StepIssue::warning("live data unavailable");
        assert_eq!(
            serde_json::to_value(&issue).unwrap(),
            json!({ "type": "warning", "message": "live data unavailable" })
        );
    }
}
