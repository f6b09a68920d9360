//! Recovery tunables

use serde::{Deserialize, Serialize};

/// Per-step recovery limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryPolicy {
    /// Attempts (inclusive) during which the live tier is tried
    pub max_live_attempts: u32,
    /// Placeholders produced by the synthetic tier
    pub emergency_record_count: usize,
}

impl RecoveryPolicy {
    /// Default policy
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With live attempt ceiling
    #[inline]
    #[must_use]
    pub fn with_max_live_attempts(mut self, attempts: u32) -> Self {
        self.max_live_attempts = attempts;
        self
    }

    /// With synthetic record count
    #[inline]
    #[must_use]
    pub fn with_emergency_record_count(mut self, count: usize) -> Self {
        self.emergency_record_count = count;
        self
    }

    /// Whether attempt number `attempt` may still call the live service
    #[inline]
    #[must_use]
    pub fn allows_live(&self, attempt: u32) -> bool {
        attempt <= self.max_live_attempts
    }
}

impl Default for RecoveryPolicy {
    fn default() -> Self {
        Self {
            max_live_attempts: 3,
            emergency_record_count: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_allowed_through_third_attempt() {
        let policy = RecoveryPolicy::default();
        assert!(policy.allows_live(1));
        assert!(policy.allows_live(3));
        assert!(!policy.allows_live(4));
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let policy: RecoveryPolicy = serde_json::from_str(r#"{ "max_live_attempts": 5 }"#).unwrap();
        assert_eq!(policy, RecoveryPolicy::new().with_max_live_attempts(5));
    }
}
