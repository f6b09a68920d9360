//! Live search collaborators
//!
//! The live service is external; this module only fixes its boundary and
//! offers a memoizing wrapper whose response cache the watchdog can purge.

use crate::step::WorkflowStep;
use async_trait::async_trait;
use moka::future::Cache;
use rrl_watchdog::Purgeable;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

/// Live data source for one step
///
/// Any error means "no live data"; timeouts are the implementation's job.
#[async_trait]
pub trait LiveSearch<S: WorkflowStep>: Send + Sync {
    /// Fetch candidate records
    async fn search(&self, criteria: &S::Criteria) -> anyhow::Result<Vec<S::Record>>;
}

/// Response-caching wrapper around a live collaborator
///
/// Only non-empty successful responses are cached, keyed by the blake3 hash
/// of the serialized criteria.
pub struct MemoizedSearch<S: WorkflowStep, L> {
    inner: L,
    label: String,
    cache: Cache<String, Arc<Vec<S::Record>>>,
    _step: PhantomData<fn() -> S>,
}

impl<S, L> MemoizedSearch<S, L>
where
    S: WorkflowStep,
    L: LiveSearch<S>,
{
    /// Wrap `inner` with a cache of at most `max_capacity` responses
    #[must_use]
    pub fn new(inner: L, max_capacity: u64) -> Self {
        Self {
            inner,
            label: format!("live-search:{}", S::NAME),
            cache: Cache::new(max_capacity),
            _step: PhantomData,
        }
    }

    /// Wrap `inner` with a bounded cache whose entries expire after `ttl`
    #[must_use]
    pub fn with_ttl(inner: L, max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner,
            label: format!("live-search:{}", S::NAME),
            cache: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
            _step: PhantomData,
        }
    }

    /// Approximate number of cached responses
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Wrapped collaborator
    #[inline]
    #[must_use]
    pub fn inner(&self) -> &L {
        &self.inner
    }

    fn key(criteria: &S::Criteria) -> Option<String> {
        match serde_json::to_vec(criteria) {
            Ok(bytes) => Some(blake3::hash(&bytes).to_hex().to_string()),
            Err(err) => {
                tracing::debug!(step = S::NAME, error = %err, "criteria not hashable, bypassing response cache");
                None
            }
        }
    }
}

#[async_trait]
impl<S, L> LiveSearch<S> for MemoizedSearch<S, L>
where
    S: WorkflowStep,
    L: LiveSearch<S>,
{
    async fn search(&self, criteria: &S::Criteria) -> anyhow::Result<Vec<S::Record>> {
        let Some(key) = Self::key(criteria) else {
            return self.inner.search(criteria).await;
        };

        if let Some(hit) = self.cache.get(&key).await {
            tracing::debug!(step = S::NAME, "live response served from memory");
            return Ok(hit.as_ref().clone());
        }

        let records = self.inner.search(criteria).await?;
        if !records.is_empty() {
            self.cache.insert(key, Arc::new(records.clone())).await;
        }
        Ok(records)
    }
}

impl<S, L> Purgeable for MemoizedSearch<S, L>
where
    S: WorkflowStep,
    L: Send + Sync,
{
    fn label(&self) -> &str {
        &self.label
    }

    fn purge(&self) {
        self.cache.invalidate_all();
    }
}

impl<S: WorkflowStep, L> std::fmt::Debug for MemoizedSearch<S, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoizedSearch")
            .field("label", &self.label)
            .field("entries", &self.cache.entry_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::Provenance;
    use crate::steps::{LiteratureQuery, LiteratureStep, Publication};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingSearch {
        calls: AtomicUsize,
        empty: bool,
    }

    #[async_trait]
    impl LiveSearch<LiteratureStep> for CountingSearch {
        async fn search(&self, query: &LiteratureQuery) -> anyhow::Result<Vec<Publication>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.empty {
                return Ok(Vec::new());
            }
            Ok(vec![Publication {
                id: "PMID-1".to_string(),
                title: query.terms.join(" "),
                authors: vec!["Doe J".to_string()],
                journal: "Device Letters".to_string(),
                year: 2022,
                summary: String::new(),
                provenance: Provenance::real(),
            }])
        }
    }

    fn query(term: &str) -> LiteratureQuery {
        LiteratureQuery {
            terms: vec![term.to_string()],
            max_results: 5,
        }
    }

    #[tokio::test]
    async fn repeated_query_hits_memory() {
        let search = MemoizedSearch::<LiteratureStep, _>::new(CountingSearch::default(), 16);

        let first = search.search(&query("pump")).await.unwrap();
        let second = search.search(&query("pump")).await.unwrap();
        search.search(&query("stent")).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(search.inner().calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn purge_forgets_responses() {
        let search = MemoizedSearch::<LiteratureStep, _>::new(CountingSearch::default(), 16);
        search.search(&query("pump")).await.unwrap();

        search.purge();
        search.search(&query("pump")).await.unwrap();

        assert_eq!(search.inner().calls.load(Ordering::SeqCst), 2);
        assert_eq!(search.label(), "live-search:literature");
    }

    #[tokio::test]
    async fn empty_responses_are_not_cached() {
        let inner = CountingSearch {
            empty: true,
            ..CountingSearch::default()
        };
        let search = MemoizedSearch::<LiteratureStep, _>::new(inner, 16);

        assert!(search.search(&query("pump")).await.unwrap().is_empty());
        assert!(search.search(&query("pump")).await.unwrap().is_empty());
        assert_eq!(search.inner().calls.load(Ordering::SeqCst), 2);
    }
}
