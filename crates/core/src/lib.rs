//! Searchlog Core Library
//!
//! Core functionality for Searchlog, the help-center search analytics
//! service. This library records raw search events, coalesces each client's
//! keystroke stream into finished search intents and folds those intents
//! into per-term statistics.

pub mod aggregator;
pub mod clock;
pub mod coalescer;
pub mod config;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod store;
pub mod types;
pub mod worker;

// Re-export commonly used types
pub use aggregator::{Aggregation, Aggregator};
pub use clock::{Clock, ManualClock, SystemClock};
pub use coalescer::{CoalescerConfig, SessionCoalescer, SubmitPolicy};
pub use config::{SearchlogConfig, StorageBackend};
pub use error::{ErrorCategory, Result, SearchlogError};
pub use ingest::SearchIngestor;
pub use logging::{init_logger, init_logging_with_config, init_test_logger, LoggerConfig};
pub use store::{
    ArticleOracle, EventLog, MemoryStore, PgStore, RunCommit, StatisticsStore, Storage,
};
pub use types::{
    normalize_term, Article, ClientId, EventId, IntentKind, NewSearchEvent, RawSearchEvent,
    SearchIntent, SearchStatistic, TermFold,
};
pub use worker::{RunReport, StatisticsWorker, WorkerOutcome};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Get version info as a formatted string
pub fn version_info() -> String {
    format!("{} v{} - {}", NAME, VERSION, DESCRIPTION)
}
