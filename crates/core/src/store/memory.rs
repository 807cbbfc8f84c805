//! In-memory storage backend
//!
//! All state sits behind a single mutex, which makes every trait operation
//! (and in particular [`EventLog::commit`]) atomic.

use super::{ArticleOracle, EventLog, LeaseGuard, RunCommit, RunLease, StatisticsStore};
use crate::error::{Result, SearchlogError};
use crate::types::{
    Article, DeferredIntent, EventId, NewSearchEvent, RawSearchEvent, SearchStatistic, TermFold,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct Inner {
    articles: Vec<Article>,
    events: Vec<(RawSearchEvent, bool)>,
    deferred: Vec<DeferredIntent>,
    statistics: BTreeMap<String, SearchStatistic>,
    next_article_id: i64,
    next_event_id: i64,
    next_deferred_id: i64,
    oracle_unavailable: bool,
    fail_next_commit: bool,
}

impl Inner {
    fn apply(&mut self, fold: &TermFold) -> SearchStatistic {
        let row = self
            .statistics
            .entry(fold.term.clone())
            .or_insert_with(|| SearchStatistic::empty(fold.term.clone()));
        row.apply(fold);
        row.clone()
    }
}

/// Storage backend that keeps everything in process memory
///
/// # Examples
///
/// ```
/// use searchlog_core::store::{ArticleOracle, MemoryStore};
///
/// # async fn example() -> searchlog_core::Result<()> {
/// let store = MemoryStore::new();
/// store.add_article("How do I cancel my account?");
/// assert_eq!(store.match_count("CANCEL").await?, 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
    leased: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an article to the corpus and returns it
    pub fn add_article<S: Into<String>>(&self, title: S) -> Article {
        let mut inner = self.inner.lock();
        inner.next_article_id += 1;
        let article = Article {
            id: inner.next_article_id,
            title: title.into(),
        };
        inner.articles.push(article.clone());
        article
    }

    /// Makes every article lookup fail (or succeed again)
    pub fn set_oracle_available(&self, available: bool) {
        self.inner.lock().oracle_unavailable = !available;
    }

    /// Makes the next commit fail without applying anything
    pub fn fail_next_commit(&self) {
        self.inner.lock().fail_next_commit = true;
    }

    /// Number of events in the log, processed or not
    pub fn event_count(&self) -> usize {
        self.inner.lock().events.len()
    }

    /// Number of events already consumed by a worker run
    pub fn processed_count(&self) -> usize {
        self.inner
            .lock()
            .events
            .iter()
            .filter(|(_, processed)| *processed)
            .count()
    }
}

#[async_trait]
impl ArticleOracle for MemoryStore {
    async fn matching(&self, term: &str) -> Result<Vec<Article>> {
        let inner = self.inner.lock();
        if inner.oracle_unavailable {
            return Err(SearchlogError::oracle("article corpus unavailable"));
        }

        let needle = term.to_lowercase();
        Ok(inner
            .articles
            .iter()
            .filter(|article| article.title.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl EventLog for MemoryStore {
    async fn append(&self, event: NewSearchEvent) -> Result<RawSearchEvent> {
        let mut inner = self.inner.lock();
        inner.next_event_id += 1;
        let raw = RawSearchEvent {
            id: EventId(inner.next_event_id),
            client_id: event.client_id,
            term: event.term,
            submitted: event.submitted,
            timestamp: event.timestamp,
        };
        inner.events.push((raw.clone(), false));
        debug!(event_id = %raw.id, client_id = %raw.client_id, "Appended search event");
        Ok(raw)
    }

    async fn pending(&self) -> Result<Vec<RawSearchEvent>> {
        Ok(self
            .inner
            .lock()
            .events
            .iter()
            .filter(|(_, processed)| !processed)
            .map(|(event, _)| event.clone())
            .collect())
    }

    async fn deferred(&self) -> Result<Vec<DeferredIntent>> {
        Ok(self.inner.lock().deferred.clone())
    }

    async fn commit(&self, commit: RunCommit) -> Result<()> {
        let mut inner = self.inner.lock();

        if inner.fail_next_commit {
            inner.fail_next_commit = false;
            warn!("Rejecting commit on request");
            return Err(SearchlogError::storage("commit rejected"));
        }

        let processed: HashSet<EventId> = commit.processed.iter().copied().collect();
        for (event, done) in inner.events.iter_mut() {
            if processed.contains(&event.id) {
                *done = true;
            }
        }

        for fold in &commit.folds {
            inner.apply(fold);
        }

        let retired: HashSet<i64> = commit.retired_deferred.iter().copied().collect();
        inner.deferred.retain(|d| !retired.contains(&d.id));

        for intent in commit.deferred {
            inner.next_deferred_id += 1;
            let id = inner.next_deferred_id;
            inner.deferred.push(DeferredIntent { id, intent });
        }

        info!(
            "Committed run: {} events, {} folds, {} deferred",
            processed.len(),
            commit.folds.len(),
            inner.deferred.len()
        );
        Ok(())
    }

    async fn try_lease(&self) -> Result<Option<RunLease>> {
        if self
            .leased
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(None);
        }

        Ok(Some(Box::new(MemoryLease {
            flag: Arc::clone(&self.leased),
        })))
    }
}

#[async_trait]
impl StatisticsStore for MemoryStore {
    async fn upsert(&self, fold: &TermFold) -> Result<SearchStatistic> {
        Ok(self.inner.lock().apply(fold))
    }

    async fn list(&self) -> Result<Vec<SearchStatistic>> {
        Ok(self.inner.lock().statistics.values().cloned().collect())
    }

    async fn reset(&self) -> Result<u64> {
        let mut inner = self.inner.lock();
        let removed = inner.statistics.len() as u64;
        inner.statistics.clear();
        info!("Reset {} search statistics", removed);
        Ok(removed)
    }
}

struct MemoryLease {
    flag: Arc<AtomicBool>,
}

#[async_trait]
impl LeaseGuard for MemoryLease {
    async fn release(self: Box<Self>) -> Result<()> {
        // dropping clears the flag
        Ok(())
    }
}

impl Drop for MemoryLease {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
