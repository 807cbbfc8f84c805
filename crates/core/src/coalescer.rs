//! Session coalescing
//!
//! Folds the per-keystroke raw event stream into finalized search intents.
//! Every client has its own debounce session:
//!
//! - an idle client that types a term becomes pending on that term;
//! - a pending client that types again within the debounce timeout has its
//!   pending term replaced in place;
//! - a pending term older than the debounce timeout when the next event
//!   arrives is flushed as a draft intent;
//! - an explicit submission emits a submitted intent for its own term and
//!   leaves the client idle;
//! - whatever is still pending when the backlog ends is flushed as a draft.
//!
//! Sessions live in a run-scoped arena: a [`SessionCoalescer`] is created for
//! one worker run and dropped afterwards.

use crate::types::{normalize_term, ClientId, RawSearchEvent, SearchIntent};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

/// What happens to a pending draft when a submission follows it quickly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitPolicy {
    /// The submission supersedes the draft; only the submitted term counts
    #[default]
    DropDraft,
    /// The draft is counted on its own before the submission, unless it is
    /// the same term
    FlushDraft,
}

/// Coalescer configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoalescerConfig {
    /// Maximum gap between two events of a client before the pending term is
    /// considered a completed search
    #[serde(default = "default_debounce_timeout_ms")]
    pub debounce_timeout_ms: u64,
    /// Handling of a pending draft followed quickly by a submission
    #[serde(default)]
    pub submit_policy: SubmitPolicy,
    /// Flush the pending term when the next term does not extend it
    ///
    /// Off by default, so a burst of keystrokes counts once even when the
    /// user backspaces. Turn it on to count a retracted term separately:
    /// "how do i cancel my acc" followed by "how do i cancel my" then yields
    /// its own row, turning a two-row session into a three-row one.
    #[serde(default)]
    pub flush_on_divergence: bool,
}

impl Default for CoalescerConfig {
    fn default() -> Self {
        Self {
            debounce_timeout_ms: default_debounce_timeout_ms(),
            submit_policy: SubmitPolicy::default(),
            flush_on_divergence: false,
        }
    }
}

impl CoalescerConfig {
    pub fn debounce_timeout(&self) -> Duration {
        Duration::milliseconds(self.debounce_timeout_ms.min(i64::MAX as u64) as i64)
    }
}

fn default_debounce_timeout_ms() -> u64 {
    3000
}

#[derive(Debug, Clone)]
struct PendingTerm {
    term: String,
    since: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct ClientSession {
    pending: Option<PendingTerm>,
    last_seen: Option<DateTime<Utc>>,
}

impl ClientSession {
    /// Returns the effective timestamp for an event, never earlier than the
    /// last one observed for this client
    fn clamp(&mut self, client_id: &ClientId, timestamp: DateTime<Utc>) -> DateTime<Utc> {
        let effective = match self.last_seen {
            Some(last) if timestamp < last => {
                warn!(
                    client_id = %client_id,
                    "Event timestamp {} precedes last seen {}, clamping",
                    timestamp,
                    last
                );
                last
            }
            _ => timestamp,
        };
        self.last_seen = Some(effective);
        effective
    }
}

/// Per-client debounce state machine over one backlog
#[derive(Debug)]
pub struct SessionCoalescer {
    config: CoalescerConfig,
    sessions: HashMap<ClientId, ClientSession>,
}

impl SessionCoalescer {
    /// Creates a coalescer with an empty session arena
    pub fn new(config: CoalescerConfig) -> Self {
        Self {
            config,
            sessions: HashMap::new(),
        }
    }

    /// Coalesces a whole backlog and returns its intents in chronological
    /// order.
    ///
    /// Events must be in append order per client; different clients may be
    /// interleaved freely.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::{Duration, TimeZone, Utc};
    /// use searchlog_core::coalescer::{CoalescerConfig, SessionCoalescer};
    /// use searchlog_core::types::{ClientId, EventId, RawSearchEvent};
    ///
    /// let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    /// let events: Vec<RawSearchEvent> = ["h", "ho", "how"]
    ///     .iter()
    ///     .enumerate()
    ///     .map(|(i, term)| RawSearchEvent {
    ///         id: EventId(i as i64),
    ///         client_id: ClientId::from("10.0.0.1"),
    ///         term: term.to_string(),
    ///         submitted: false,
    ///         timestamp: start + Duration::milliseconds(50 * i as i64),
    ///     })
    ///     .collect();
    ///
    /// let intents = SessionCoalescer::new(CoalescerConfig::default()).coalesce(&events);
    /// assert_eq!(intents.len(), 1);
    /// assert_eq!(intents[0].term, "how");
    /// ```
    pub fn coalesce<'a, I>(mut self, events: I) -> Vec<SearchIntent>
    where
        I: IntoIterator<Item = &'a RawSearchEvent>,
    {
        let mut intents = Vec::new();
        for event in events {
            intents.extend(self.observe(event));
        }
        intents.extend(self.finish());

        // stable: ties keep emission order
        intents.sort_by_key(|intent| intent.occurred_at);
        intents
    }

    /// Applies one event to its client's session and returns the intents it
    /// finalizes (zero, one or two)
    pub fn observe(&mut self, event: &RawSearchEvent) -> Vec<SearchIntent> {
        let timeout = self.config.debounce_timeout();
        let session = self.sessions.entry(event.client_id.clone()).or_default();
        let timestamp = session.clamp(&event.client_id, event.timestamp);

        let mut emitted = Vec::new();

        if let Some(pending) = session.pending.take() {
            let gap = timestamp - pending.since;

            if gap > timeout {
                debug!(
                    client_id = %event.client_id,
                    term = %pending.term,
                    gap_ms = gap.num_milliseconds(),
                    "Pending term timed out"
                );
                emitted.push(SearchIntent::draft(
                    event.client_id.clone(),
                    pending.term,
                    pending.since,
                ));
            } else if self.config.flush_on_divergence && !extends(&pending.term, &event.term) {
                debug!(
                    client_id = %event.client_id,
                    term = %pending.term,
                    next = %event.term,
                    "Pending term abandoned for a diverging term"
                );
                emitted.push(SearchIntent::draft(
                    event.client_id.clone(),
                    pending.term,
                    pending.since,
                ));
            } else if event.submitted {
                match self.config.submit_policy {
                    SubmitPolicy::DropDraft => {
                        debug!(
                            client_id = %event.client_id,
                            term = %pending.term,
                            "Pending draft superseded by submission"
                        );
                    }
                    SubmitPolicy::FlushDraft => {
                        if normalize_term(&pending.term) != normalize_term(&event.term) {
                            emitted.push(SearchIntent::draft(
                                event.client_id.clone(),
                                pending.term,
                                pending.since,
                            ));
                        }
                    }
                }
            } else {
                debug!(
                    client_id = %event.client_id,
                    from = %pending.term,
                    to = %event.term,
                    "Pending term replaced"
                );
            }
        }

        if event.submitted {
            emitted.push(SearchIntent::submitted(
                event.client_id.clone(),
                event.term.clone(),
                timestamp,
            ));
        } else {
            session.pending = Some(PendingTerm {
                term: event.term.clone(),
                since: timestamp,
            });
        }

        emitted
    }

    /// Flushes every pending term as a draft and clears the arena
    pub fn finish(&mut self) -> Vec<SearchIntent> {
        let mut flushed: Vec<SearchIntent> = self
            .sessions
            .drain()
            .filter_map(|(client_id, session)| {
                session
                    .pending
                    .map(|pending| SearchIntent::draft(client_id, pending.term, pending.since))
            })
            .collect();

        flushed.sort_by(|a, b| {
            a.occurred_at
                .cmp(&b.occurred_at)
                .then_with(|| a.client_id.cmp(&b.client_id))
        });

        debug!("Flushed {} pending terms at end of backlog", flushed.len());
        flushed
    }

    /// Number of clients currently holding a pending term
    pub fn pending_clients(&self) -> usize {
        self.sessions
            .values()
            .filter(|session| session.pending.is_some())
            .count()
    }

    pub fn config(&self) -> &CoalescerConfig {
        &self.config
    }
}

/// Whether `next` continues typing `pending` rather than starting over
fn extends(pending: &str, next: &str) -> bool {
    normalize_term(next).starts_with(&normalize_term(pending))
}
