//! Render-cost backstop
//!
//! While the degradation flag is up, collections handed to rendering code go
//! through [`RenderGuard`] and are cut to the configured limit.

use std::sync::atomic::{AtomicBool, Ordering};

/// Degradation flag plus truncating list helpers
#[derive(Debug)]
pub struct RenderGuard {
    degraded: AtomicBool,
    limit: usize,
}

impl RenderGuard {
    /// Guard that truncates to `limit` once engaged
    #[inline]
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            degraded: AtomicBool::new(false),
            limit,
        }
    }

    /// Raise the degradation flag
    pub fn engage(&self) {
        if !self.degraded.swap(true, Ordering::SeqCst) {
            tracing::info!(limit = self.limit, "render guard engaged");
        }
    }

    /// Lower the degradation flag
    pub fn release(&self) {
        self.degraded.store(false, Ordering::SeqCst);
    }

    /// Whether truncation is active
    #[inline]
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    /// Truncation limit
    #[inline]
    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    fn effective_limit(&self) -> usize {
        if self.is_degraded() {
            self.limit
        } else {
            usize::MAX
        }
    }

    /// Slice view, truncated while degraded
    #[must_use]
    pub fn clamp<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let limit = self.effective_limit();
        if items.len() > limit {
            tracing::debug!(len = items.len(), limit, "render list truncated");
            &items[..limit]
        } else {
            items
        }
    }

    /// Iterator, truncated while degraded
    pub fn take<I: IntoIterator>(&self, items: I) -> std::iter::Take<I::IntoIter> {
        items.into_iter().take(self.effective_limit())
    }

    /// Map over a slice, truncated while degraded
    pub fn map<T, U>(&self, items: &[T], f: impl FnMut(&T) -> U) -> Vec<U> {
        self.clamp(items).iter().map(f).collect()
    }
}

impl Default for RenderGuard {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_everything_until_engaged() {
        let guard = RenderGuard::new(100);
        let rows: Vec<u32> = (0..250).collect();

        assert_eq!(guard.clamp(&rows).len(), 250);
        assert_eq!(guard.take(rows.iter()).count(), 250);
    }

    #[test]
    fn truncates_when_engaged() {
        let guard = RenderGuard::new(100);
        let rows: Vec<u32> = (0..250).collect();
        guard.engage();

        assert_eq!(guard.clamp(&rows).len(), 100);
        assert_eq!(guard.take(rows.clone()).count(), 100);
        let labels = guard.map(&rows, |n| format!("row {n}"));
        assert_eq!(labels.len(), 100);
        assert_eq!(labels[99], "row 99");

        let short = [1, 2, 3];
        assert_eq!(guard.clamp(&short), &short);
    }

    #[test]
    fn release_restores_full_lists() {
        let guard = RenderGuard::new(2);
        guard.engage();
        guard.release();
        assert!(!guard.is_degraded());
        assert_eq!(guard.clamp(&[1, 2, 3]).len(), 3);
    }
}
