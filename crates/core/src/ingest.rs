//! Search ingestion
//!
//! Records one raw event per typed query and answers it with the matching
//! articles.

use crate::clock::Clock;
use crate::error::Result;
use crate::store::{ArticleOracle, EventLog};
use crate::types::{Article, ClientId, NewSearchEvent, RawSearchEvent};
use std::sync::Arc;
use tracing::debug;

/// Accepts typed queries from clients
#[derive(Clone)]
pub struct SearchIngestor {
    log: Arc<dyn EventLog>,
    oracle: Arc<dyn ArticleOracle>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for SearchIngestor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchIngestor").finish_non_exhaustive()
    }
}

impl SearchIngestor {
    pub fn new(
        log: Arc<dyn EventLog>,
        oracle: Arc<dyn ArticleOracle>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { log, oracle, clock }
    }

    /// Logs a search and returns the articles matching its term
    ///
    /// # Errors
    ///
    /// Returns `SearchlogError::Validation` for a blank term. Articles are
    /// looked up before the event is appended, so a blank term or a failed
    /// lookup leaves the event log untouched.
    pub async fn search(
        &self,
        client_id: ClientId,
        term: &str,
        submitted: bool,
    ) -> Result<(RawSearchEvent, Vec<Article>)> {
        let event = NewSearchEvent::new(client_id, term, submitted, self.clock.now())?;
        let articles = self.oracle.matching(&event.term).await?;
        let event = self.log.append(event).await?;

        debug!(
            event_id = %event.id,
            submitted = event.submitted,
            "Search matched {} articles",
            articles.len()
        );

        Ok((event, articles))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryStore;
    use chrono::{Duration, TimeZone, Utc};

    fn ingestor(store: &MemoryStore, clock: &ManualClock) -> SearchIngestor {
        SearchIngestor::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(clock.clone()),
        )
    }

    #[tokio::test]
    async fn test_search_logs_event_with_clock_time() {
        let store = MemoryStore::new();
        store.add_article("How do I cancel my account?");
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        let ingestor = ingestor(&store, &clock);

        clock.advance(Duration::milliseconds(50));
        let (event, articles) = ingestor
            .search(ClientId::from("10.1.1.1"), "How", true)
            .await
            .unwrap();

        assert_eq!(event.timestamp, start + Duration::milliseconds(50));
        assert_eq!(event.term, "How");
        assert!(event.submitted);
        assert_eq!(articles.len(), 1);
        assert_eq!(store.event_count(), 1);
    }

    #[tokio::test]
    async fn test_blank_search_is_not_logged() {
        let store = MemoryStore::new();
        let clock = ManualClock::new(Utc::now());
        let ingestor = ingestor(&store, &clock);

        let result = ingestor.search(ClientId::from("10.1.1.1"), "  ", false).await;

        tokio_test::assert_err!(result);
        assert_eq!(store.event_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_lookup_is_not_logged() {
        let store = MemoryStore::new();
        store.add_article("How do I cancel my account?");
        store.set_oracle_available(false);
        let clock = ManualClock::new(Utc::now());
        let ingestor = ingestor(&store, &clock);

        let err = ingestor
            .search(ClientId::from("10.1.1.1"), "how", false)
            .await
            .unwrap_err();

        assert!(err.is_retryable());
        assert_eq!(store.event_count(), 0);

        store.set_oracle_available(true);
        tokio_test::assert_ok!(ingestor.search(ClientId::from("10.1.1.1"), "how", false).await);
        assert_eq!(store.event_count(), 1);
    }
}
