//! Core type definitions for Searchlog

use crate::error::{Result, SearchlogError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identity of a searching client (usually a network address)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(pub String);

impl ClientId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ClientId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ClientId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a persisted raw event, increasing in append order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub i64);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A typed query as accepted at ingestion, before it is persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSearchEvent {
    pub client_id: ClientId,
    pub term: String,
    pub submitted: bool,
    pub timestamp: DateTime<Utc>,
}

impl NewSearchEvent {
    /// Builds an ingestion event, rejecting blank terms.
    ///
    /// The term is trimmed but keeps its original casing; normalization for
    /// aggregation happens later.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::Utc;
    /// use searchlog_core::types::{ClientId, NewSearchEvent};
    ///
    /// let event = NewSearchEvent::new(ClientId::from("10.0.0.1"), "  How ", false, Utc::now()).unwrap();
    /// assert_eq!(event.term, "How");
    ///
    /// assert!(NewSearchEvent::new(ClientId::from("10.0.0.1"), "   ", false, Utc::now()).is_err());
    /// ```
    pub fn new<S: AsRef<str>>(
        client_id: ClientId,
        term: S,
        submitted: bool,
        timestamp: DateTime<Utc>,
    ) -> Result<Self> {
        let term = term.as_ref().trim();
        if term.is_empty() {
            return Err(SearchlogError::validation("Search term cannot be empty"));
        }

        Ok(Self {
            client_id,
            term: term.to_string(),
            submitted,
            timestamp,
        })
    }
}

/// An immutable entry of the raw event log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSearchEvent {
    pub id: EventId,
    pub client_id: ClientId,
    pub term: String,
    pub submitted: bool,
    pub timestamp: DateTime<Utc>,
}

/// How a search intent was finalized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentKind {
    /// Flushed by the debounce timeout or at the end of the backlog
    Draft,
    /// The user explicitly committed the term
    Submitted,
}

impl fmt::Display for IntentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::Submitted => write!(f, "submitted"),
        }
    }
}

impl std::str::FromStr for IntentKind {
    type Err = SearchlogError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "draft" => Ok(Self::Draft),
            "submitted" => Ok(Self::Submitted),
            _ => Err(SearchlogError::validation(format!(
                "Invalid intent kind: {}",
                s
            ))),
        }
    }
}

/// One completed search by one client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchIntent {
    pub client_id: ClientId,
    pub term: String,
    pub occurred_at: DateTime<Utc>,
    pub kind: IntentKind,
}

impl SearchIntent {
    pub fn draft(client_id: ClientId, term: String, occurred_at: DateTime<Utc>) -> Self {
        Self {
            client_id,
            term,
            occurred_at,
            kind: IntentKind::Draft,
        }
    }

    pub fn submitted(client_id: ClientId, term: String, occurred_at: DateTime<Utc>) -> Self {
        Self {
            client_id,
            term,
            occurred_at,
            kind: IntentKind::Submitted,
        }
    }

    /// The aggregation key of this intent
    pub fn normalized_term(&self) -> String {
        normalize_term(&self.term)
    }
}

/// A search intent that could not be folded and waits for a later run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeferredIntent {
    pub id: i64,
    pub intent: SearchIntent,
}

/// Durable aggregate row keyed by normalized term
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchStatistic {
    pub term: String,
    pub count: i64,
    pub article_count: i64,
    pub zero_article_count: i64,
}

impl SearchStatistic {
    /// An empty row for `term`, before any fold is applied
    pub fn empty<S: Into<String>>(term: S) -> Self {
        Self {
            term: term.into(),
            count: 0,
            article_count: 0,
            zero_article_count: 0,
        }
    }

    /// Applies a fold to this row in place
    pub fn apply(&mut self, fold: &TermFold) {
        self.count += fold.intents;
        self.article_count = fold.article_count;
        if fold.article_count == 0 {
            self.zero_article_count += fold.intents;
        }
    }
}

/// The effect of folding `intents` intents for one term with one article
/// snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermFold {
    /// Normalized term
    pub term: String,
    /// Number of intents folded, at least one
    pub intents: i64,
    /// Matching article count at fold time
    pub article_count: i64,
}

impl TermFold {
    /// A fold for exactly one intent
    pub fn single<S: Into<String>>(term: S, match_count: usize) -> Self {
        Self {
            term: term.into(),
            intents: 1,
            article_count: match_count as i64,
        }
    }

    /// Number of intents this fold adds to `zero_article_count`
    pub fn zero_article_intents(&self) -> i64 {
        if self.article_count == 0 {
            self.intents
        } else {
            0
        }
    }
}

/// A help-center article as returned by the match oracle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    pub title: String,
}

/// Normalizes a term for aggregation: trimmed and lowercased.
///
/// # Examples
///
/// ```
/// use searchlog_core::types::normalize_term;
///
/// assert_eq!(normalize_term("  How Do I "), "how do i");
/// ```
pub fn normalize_term(term: &str) -> String {
    term.trim().to_lowercase()
}
