//! Session-scoped recovery state
//!
//! Attempt counters and the synthetic-record memo live here instead of in
//! globals. A workflow session owns one context and shares it through `Arc`.

use dashmap::DashMap;
use std::any::Any;
use std::sync::Arc;

type MemoEntry = Arc<dyn Any + Send + Sync>;

/// Attempt counters and synthetic memo for one session
#[derive(Default)]
pub struct ResilienceContext {
    attempts: DashMap<&'static str, u32>,
    memo: DashMap<(&'static str, String), MemoEntry>,
}

impl ResilienceContext {
    /// Fresh context, every counter at zero
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bump and return the attempt counter of `step`
    pub fn next_attempt(&self, step: &'static str) -> u32 {
        let mut count = self.attempts.entry(step).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    /// Attempts recorded for `step`
    #[must_use]
    pub fn attempts(&self, step: &str) -> u32 {
        self.attempts.get(step).map_or(0, |count| *count)
    }

    /// Reset every counter and forget memoized records
    pub fn reset(&self) {
        self.attempts.clear();
        self.memo.clear();
        tracing::debug!("resilience context reset");
    }

    /// Reset one step's counter and memo
    pub fn reset_step(&self, step: &str) {
        self.attempts.remove(step);
        self.memo.retain(|(name, _), _| *name != step);
    }

    /// Memoized synthetic records of `step` for `profile_key`
    #[must_use]
    pub fn memoized<R>(&self, step: &'static str, profile_key: &str) -> Option<Vec<R>>
    where
        R: Clone + Send + Sync + 'static,
    {
        self.memo
            .get(&(step, profile_key.to_string()))
            .and_then(|entry| entry.downcast_ref::<Vec<R>>().cloned())
    }

    /// Remember synthetic records of `step` for `profile_key`
    pub fn memoize<R>(&self, step: &'static str, profile_key: &str, records: Vec<R>)
    where
        R: Send + Sync + 'static,
    {
        self.memo.insert((step, profile_key.to_string()), Arc::new(records));
    }
}

impl std::fmt::Debug for ResilienceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let attempts: Vec<(&str, u32)> = self
            .attempts
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect();
        f.debug_struct("ResilienceContext")
            .field("attempts", &attempts)
            .field("memoized", &self.memo.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempts_increase_by_one() {
        let context = ResilienceContext::new();
        assert_eq!(context.attempts("literature"), 0);

        assert_eq!(context.next_attempt("literature"), 1);
        assert_eq!(context.next_attempt("literature"), 2);
        assert_eq!(context.next_attempt("reference_devices"), 1);

        assert_eq!(context.attempts("literature"), 2);
    }

    #[test]
    fn reset_zeroes_counters_and_memo() {
        let context = ResilienceContext::new();
        context.next_attempt("literature");
        context.memoize("literature", "device-1", vec![1_u32, 2, 3]);

        context.reset();

        assert_eq!(context.attempts("literature"), 0);
        assert_eq!(context.memoized::<u32>("literature", "device-1"), None);
    }

    #[test]
    fn reset_step_leaves_other_steps() {
        let context = ResilienceContext::new();
        context.next_attempt("literature");
        context.next_attempt("reference_devices");
        context.memoize("literature", "device-1", vec!["a".to_string()]);
        context.memoize("reference_devices", "device-1", vec!["b".to_string()]);

        context.reset_step("literature");

        assert_eq!(context.attempts("literature"), 0);
        assert_eq!(context.attempts("reference_devices"), 1);
        assert_eq!(context.memoized::<String>("literature", "device-1"), None);
        assert_eq!(
            context.memoized::<String>("reference_devices", "device-1"),
            Some(vec!["b".to_string()])
        );
    }

    #[test]
    fn memo_is_typed() {
        let context = ResilienceContext::new();
        context.memoize("literature", "device-1", vec![1_u32]);
        assert_eq!(context.memoized::<u64>("literature", "device-1"), None);
        assert_eq!(context.memoized::<u32>("literature", "device-2"), None);
    }
}
