//! Search statistic aggregation
//!
//! Turns finalized search intents into per-term folds. Intents are grouped by
//! normalized term and the article oracle is asked once per distinct term, so
//! every fold carries one consistent article snapshot. A term whose lookup
//! fails is not folded at all; its intents are handed back for a later run.

use crate::store::ArticleOracle;
use crate::types::{SearchIntent, TermFold};
use indexmap::IndexMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of aggregating one batch of intents
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregation {
    /// One fold per distinct normalized term, in first-seen order
    pub folds: Vec<TermFold>,
    /// Intents whose term could not be looked up
    pub deferred: Vec<SearchIntent>,
}

impl Aggregation {
    /// Total number of intents represented by the folds
    pub fn intents_folded(&self) -> i64 {
        self.folds.iter().map(|fold| fold.intents).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.folds.is_empty() && self.deferred.is_empty()
    }
}

/// Aggregator for folding intents into statistic updates
#[derive(Clone)]
pub struct Aggregator {
    oracle: Arc<dyn ArticleOracle>,
}

impl std::fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aggregator").finish_non_exhaustive()
    }
}

impl Aggregator {
    /// Creates an aggregator backed by the given article oracle
    pub fn new(oracle: Arc<dyn ArticleOracle>) -> Self {
        Self { oracle }
    }

    /// Aggregates intents into per-term folds
    ///
    /// # Arguments
    ///
    /// * `intents` - Finalized intents, in any order
    ///
    /// # Returns
    ///
    /// Returns the folds to apply and the intents to retry later
    pub async fn aggregate(&self, intents: Vec<SearchIntent>) -> Aggregation {
        let mut groups: IndexMap<String, Vec<SearchIntent>> = IndexMap::new();

        for intent in intents {
            let term = intent.normalized_term();
            if term.is_empty() {
                warn!(client_id = %intent.client_id, "Dropping intent with empty term");
                continue;
            }
            groups.entry(term).or_default().push(intent);
        }

        let mut aggregation = Aggregation::default();

        for (term, group) in groups {
            match self.oracle.match_count(&term).await {
                Ok(match_count) => {
                    debug!(
                        term = %term,
                        intents = group.len(),
                        article_count = match_count,
                        "Folding term"
                    );
                    aggregation.folds.push(TermFold {
                        term,
                        intents: group.len() as i64,
                        article_count: match_count as i64,
                    });
                }
                Err(e) => {
                    warn!(
                        term = %term,
                        intents = group.len(),
                        category = %e.category(),
                        "Article lookup failed, deferring fold: {}",
                        e
                    );
                    aggregation.deferred.extend(group);
                }
            }
        }

        info!(
            "Aggregated {} intents into {} terms ({} deferred)",
            aggregation.intents_folded(),
            aggregation.folds.len(),
            aggregation.deferred.len()
        );

        aggregation
    }
}
