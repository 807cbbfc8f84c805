//! Storage for raw search events and search statistics
//!
//! # Architecture
//!
//! The store module is organized into:
//!
//! - `memory`: in-process backend, used by tests and single-node setups
//! - `postgres`: PostgreSQL backend built on sqlx
//!
//! Both backends implement the same three traits:
//!
//! - [`ArticleOracle`]: which articles match a term
//! - [`EventLog`]: the append-only raw event log, the deferred-intent queue
//!   and the atomic commit of a worker run
//! - [`StatisticsStore`]: the aggregate table read by the reporting endpoint

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::config::{SearchlogConfig, StorageBackend};
use crate::error::Result;
use crate::types::{
    Article, DeferredIntent, EventId, NewSearchEvent, RawSearchEvent, SearchIntent,
    SearchStatistic, TermFold,
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Answers which articles match a search term
///
/// Matching is a case-insensitive substring match over article titles.
#[async_trait]
pub trait ArticleOracle: Send + Sync {
    /// Articles whose title contains `term`, ordered by id
    async fn matching(&self, term: &str) -> Result<Vec<Article>>;

    /// Number of articles whose title contains `term`
    async fn match_count(&self, term: &str) -> Result<usize> {
        Ok(self.matching(term).await?.len())
    }
}

/// Append-only log of raw search events
#[async_trait]
pub trait EventLog: Send + Sync {
    /// Appends one event and returns it with its assigned id
    async fn append(&self, event: NewSearchEvent) -> Result<RawSearchEvent>;

    /// All events not yet consumed by a worker run, in append order
    async fn pending(&self) -> Result<Vec<RawSearchEvent>>;

    /// Intents left unfolded by earlier runs
    async fn deferred(&self) -> Result<Vec<DeferredIntent>>;

    /// Applies the outcome of a worker run atomically
    ///
    /// Either every part of the commit becomes visible or none does.
    async fn commit(&self, commit: RunCommit) -> Result<()>;

    /// Tries to take the exclusive worker lease
    ///
    /// Returns `None` when another run holds it.
    async fn try_lease(&self) -> Result<Option<RunLease>>;
}

/// Durable per-term statistics
#[async_trait]
pub trait StatisticsStore: Send + Sync {
    /// Creates or updates the row for `fold.term`
    async fn upsert(&self, fold: &TermFold) -> Result<SearchStatistic>;

    /// All rows ordered by term
    async fn list(&self) -> Result<Vec<SearchStatistic>>;

    /// Deletes all rows and returns how many were removed
    async fn reset(&self) -> Result<u64>;
}

/// Everything a completed worker run writes back
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunCommit {
    /// Events consumed by the run
    pub processed: Vec<EventId>,
    /// Statistic updates
    pub folds: Vec<TermFold>,
    /// Previously deferred intents that this run retried
    pub retired_deferred: Vec<i64>,
    /// Intents that could not be folded in this run
    pub deferred: Vec<SearchIntent>,
}

impl RunCommit {
    pub fn is_empty(&self) -> bool {
        self.processed.is_empty()
            && self.folds.is_empty()
            && self.retired_deferred.is_empty()
            && self.deferred.is_empty()
    }
}

/// Held exclusive access to the backlog
#[async_trait]
pub trait LeaseGuard: Send {
    /// Gives the lease back
    async fn release(self: Box<Self>) -> Result<()>;
}

/// Boxed lease returned by [`EventLog::try_lease`]
pub type RunLease = Box<dyn LeaseGuard>;

/// Handles to one opened backend
#[derive(Clone)]
pub struct Storage {
    pub log: Arc<dyn EventLog>,
    pub stats: Arc<dyn StatisticsStore>,
    pub oracle: Arc<dyn ArticleOracle>,
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage").finish_non_exhaustive()
    }
}

impl Storage {
    /// Shares one backend value across all three roles
    pub fn from_backend<B>(backend: B) -> Self
    where
        B: ArticleOracle + EventLog + StatisticsStore + 'static,
    {
        let backend = Arc::new(backend);
        Self {
            log: backend.clone(),
            stats: backend.clone(),
            oracle: backend,
        }
    }

    /// Opens the backend selected in the configuration
    ///
    /// The postgres backend applies migrations first when
    /// `database.run_migrations` is set.
    pub async fn open(config: &SearchlogConfig) -> Result<Self> {
        match config.database.backend {
            StorageBackend::Memory => {
                info!("Using in-memory storage");
                Ok(Self::from_backend(MemoryStore::new()))
            }
            StorageBackend::Postgres => {
                let store = PgStore::connect(&config.database, config.worker.lease_key).await?;
                if config.database.run_migrations {
                    store.migrate().await?;
                }
                Ok(Self::from_backend(store))
            }
        }
    }
}

/// Escapes LIKE wildcards so a term is matched literally
pub(crate) fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("how"), "how");
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("snake_case"), "snake\\_case");
        assert_eq!(escape_like("a\\b"), "a\\\\b");
    }

    #[tokio::test]
    async fn test_open_memory_backend_shares_state() {
        let storage = Storage::open(&SearchlogConfig::default()).await.unwrap();
        let event = NewSearchEvent::new(
            crate::types::ClientId::from("a"),
            "how",
            false,
            chrono::Utc::now(),
        )
        .unwrap();

        storage.log.append(event).await.unwrap();
        storage.stats.upsert(&TermFold::single("how", 0)).await.unwrap();

        assert_eq!(storage.log.pending().await.unwrap().len(), 1);
        assert_eq!(storage.stats.list().await.unwrap().len(), 1);
        assert_eq!(storage.oracle.match_count("how").await.unwrap(), 0);
    }

    #[test]
    fn test_empty_commit() {
        assert!(RunCommit::default().is_empty());
        let commit = RunCommit {
            folds: vec![TermFold::single("how", 3)],
            ..RunCommit::default()
        };
        assert!(!commit.is_empty());
    }
}
