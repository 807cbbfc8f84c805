//! PostgreSQL storage backend
//!
//! Tables are created by the embedded migrations under `migrations/`:
//!
//! - `articles`: the help-center corpus queried by the match oracle
//! - `search_events`: the raw event log; `processed_at` marks consumed rows
//! - `search_statistics`: one row per normalized term
//! - `deferred_intents`: intents waiting for the oracle to come back
//!
//! Worker runs are serialized across processes with a session-level advisory
//! lock held on a dedicated pooled connection.

use super::{
    escape_like, ArticleOracle, EventLog, LeaseGuard, RunCommit, RunLease, StatisticsStore,
};
use crate::config::DatabaseConfig;
use crate::error::{Result, SearchlogError};
use crate::types::{
    Article, ClientId, DeferredIntent, EventId, IntentKind, NewSearchEvent, RawSearchEvent,
    SearchIntent, SearchStatistic, TermFold,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::pool::PoolConnection;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres};
use tracing::{debug, info, warn};

#[derive(Debug, sqlx::FromRow)]
struct EventRow {
    id: i64,
    client_id: String,
    term: String,
    submitted: bool,
    searched_at: DateTime<Utc>,
}

impl From<EventRow> for RawSearchEvent {
    fn from(row: EventRow) -> Self {
        Self {
            id: EventId(row.id),
            client_id: ClientId(row.client_id),
            term: row.term,
            submitted: row.submitted,
            timestamp: row.searched_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DeferredRow {
    id: i64,
    client_id: String,
    term: String,
    occurred_at: DateTime<Utc>,
    kind: String,
}

impl TryFrom<DeferredRow> for DeferredIntent {
    type Error = SearchlogError;

    fn try_from(row: DeferredRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            intent: SearchIntent {
                client_id: ClientId(row.client_id),
                term: row.term,
                occurred_at: row.occurred_at,
                kind: row.kind.parse::<IntentKind>()?,
            },
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct StatisticRow {
    term: String,
    count: i64,
    article_count: i64,
    zero_article_count: i64,
}

impl From<StatisticRow> for SearchStatistic {
    fn from(row: StatisticRow) -> Self {
        Self {
            term: row.term,
            count: row.count,
            article_count: row.article_count,
            zero_article_count: row.zero_article_count,
        }
    }
}

const MATCH_CONDITION: &str = r"title ILIKE '%' || $1 || '%' ESCAPE '\'";

/// Storage backend on top of a PostgreSQL pool
///
/// # Examples
///
/// ```no_run
/// use searchlog_core::config::DatabaseConfig;
/// use searchlog_core::store::PgStore;
///
/// # async fn example() -> searchlog_core::Result<()> {
/// let config = DatabaseConfig {
///     url: "postgresql://localhost/searchlog".to_string(),
///     ..DatabaseConfig::default()
/// };
/// let store = PgStore::connect(&config, 42).await?;
/// store.migrate().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
    lease_key: i64,
}

impl PgStore {
    /// Wraps an existing pool
    pub fn new(pool: PgPool, lease_key: i64) -> Self {
        Self { pool, lease_key }
    }

    /// Opens a pool for the configured database
    pub async fn connect(config: &DatabaseConfig, lease_key: i64) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await?;

        info!(
            "Connected to database with up to {} connections",
            config.max_connections
        );
        Ok(Self::new(pool, lease_key))
    }

    /// Applies the embedded schema migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations applied");
        Ok(())
    }

    /// Adds an article to the corpus
    pub async fn add_article(&self, title: &str) -> Result<Article> {
        let (id, title) = sqlx::query_as::<_, (i64, String)>(
            "INSERT INTO articles (title) VALUES ($1) RETURNING id, title",
        )
        .bind(title)
        .fetch_one(&self.pool)
        .await?;

        Ok(Article { id, title })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn upsert_with<'e, E>(fold: &TermFold, executor: E) -> Result<SearchStatistic>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, StatisticRow>(
            r#"
            INSERT INTO search_statistics (term, count, article_count, zero_article_count)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (term) DO UPDATE
                SET count = search_statistics.count + EXCLUDED.count,
                    article_count = EXCLUDED.article_count,
                    zero_article_count = search_statistics.zero_article_count
                        + EXCLUDED.zero_article_count,
                    updated_at = now()
            RETURNING term, count, article_count, zero_article_count
            "#,
        )
        .bind(&fold.term)
        .bind(fold.intents)
        .bind(fold.article_count)
        .bind(fold.zero_article_intents())
        .fetch_one(executor)
        .await?;

        Ok(row.into())
    }
}

#[async_trait]
impl ArticleOracle for PgStore {
    async fn matching(&self, term: &str) -> Result<Vec<Article>> {
        let rows = sqlx::query_as::<_, (i64, String)>(&format!(
            "SELECT id, title FROM articles WHERE {} ORDER BY id",
            MATCH_CONDITION
        ))
        .bind(escape_like(term))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| SearchlogError::oracle(format!("Failed to match articles: {}", e)))?;

        Ok(rows
            .into_iter()
            .map(|(id, title)| Article { id, title })
            .collect())
    }

    async fn match_count(&self, term: &str) -> Result<usize> {
        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM articles WHERE {}",
            MATCH_CONDITION
        ))
        .bind(escape_like(term))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| SearchlogError::oracle(format!("Failed to count articles: {}", e)))?;

        Ok(count.max(0) as usize)
    }
}

#[async_trait]
impl EventLog for PgStore {
    async fn append(&self, event: NewSearchEvent) -> Result<RawSearchEvent> {
        let row = sqlx::query_as::<_, EventRow>(
            r#"
            INSERT INTO search_events (client_id, term, submitted, searched_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, client_id, term, submitted, searched_at
            "#,
        )
        .bind(event.client_id.as_str())
        .bind(&event.term)
        .bind(event.submitted)
        .bind(event.timestamp)
        .fetch_one(&self.pool)
        .await?;

        debug!(event_id = row.id, client_id = %row.client_id, "Appended search event");
        Ok(row.into())
    }

    async fn pending(&self) -> Result<Vec<RawSearchEvent>> {
        let rows = sqlx::query_as::<_, EventRow>(
            r#"
            SELECT id, client_id, term, submitted, searched_at
            FROM search_events
            WHERE processed_at IS NULL
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        debug!("Loaded {} pending search events", rows.len());
        Ok(rows.into_iter().map(RawSearchEvent::from).collect())
    }

    async fn deferred(&self) -> Result<Vec<DeferredIntent>> {
        let rows = sqlx::query_as::<_, DeferredRow>(
            "SELECT id, client_id, term, occurred_at, kind FROM deferred_intents ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(DeferredIntent::try_from).collect()
    }

    async fn commit(&self, commit: RunCommit) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let processed: Vec<i64> = commit.processed.iter().map(|id| id.0).collect();
        if !processed.is_empty() {
            let result = sqlx::query(
                "UPDATE search_events SET processed_at = now() WHERE id = ANY($1) AND processed_at IS NULL",
            )
            .bind(&processed)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() != processed.len() as u64 {
                warn!(
                    "Marked {} of {} events processed; the rest were already consumed",
                    result.rows_affected(),
                    processed.len()
                );
            }
        }

        for fold in &commit.folds {
            Self::upsert_with(fold, &mut *tx).await?;
        }

        if !commit.retired_deferred.is_empty() {
            sqlx::query("DELETE FROM deferred_intents WHERE id = ANY($1)")
                .bind(&commit.retired_deferred)
                .execute(&mut *tx)
                .await?;
        }

        for intent in &commit.deferred {
            sqlx::query(
                "INSERT INTO deferred_intents (client_id, term, occurred_at, kind) VALUES ($1, $2, $3, $4)",
            )
            .bind(intent.client_id.as_str())
            .bind(&intent.term)
            .bind(intent.occurred_at)
            .bind(intent.kind.to_string())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(
            "Committed run: {} events, {} folds, {} deferred",
            processed.len(),
            commit.folds.len(),
            commit.deferred.len()
        );
        Ok(())
    }

    async fn try_lease(&self) -> Result<Option<RunLease>> {
        let mut conn = self.pool.acquire().await?;

        let acquired: bool = sqlx::query_scalar("SELECT pg_try_advisory_lock($1)")
            .bind(self.lease_key)
            .fetch_one(&mut *conn)
            .await?;

        if !acquired {
            debug!(lease_key = self.lease_key, "Worker lease held elsewhere");
            return Ok(None);
        }

        Ok(Some(Box::new(PgLease {
            conn: Some(conn),
            key: self.lease_key,
        })))
    }
}

#[async_trait]
impl StatisticsStore for PgStore {
    async fn upsert(&self, fold: &TermFold) -> Result<SearchStatistic> {
        Self::upsert_with(fold, &self.pool).await
    }

    async fn list(&self) -> Result<Vec<SearchStatistic>> {
        let rows = sqlx::query_as::<_, StatisticRow>(
            "SELECT term, count, article_count, zero_article_count FROM search_statistics ORDER BY term",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(SearchStatistic::from).collect())
    }

    async fn reset(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM search_statistics")
            .execute(&self.pool)
            .await?;

        info!("Reset {} search statistics", result.rows_affected());
        Ok(result.rows_affected())
    }
}

/// Advisory lock held on one pooled connection
struct PgLease {
    conn: Option<PoolConnection<Postgres>>,
    key: i64,
}

#[async_trait]
impl LeaseGuard for PgLease {
    async fn release(self: Box<Self>) -> Result<()> {
        let mut this = self;
        let Some(mut conn) = this.conn.take() else {
            return Ok(());
        };

        let unlocked: std::result::Result<bool, sqlx::Error> =
            sqlx::query_scalar("SELECT pg_advisory_unlock($1)")
                .bind(this.key)
                .fetch_one(&mut *conn)
                .await;

        match unlocked {
            Ok(true) => Ok(()),
            Ok(false) => {
                // lock was not held by this session; do not pool it
                drop(conn.detach());
                Err(SearchlogError::invalid_state(
                    "Worker lease was not held at release",
                ))
            }
            Err(e) => {
                drop(conn.detach());
                Err(e.into())
            }
        }
    }
}

impl Drop for PgLease {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            // Closing the session releases its advisory locks.
            drop(conn.detach());
        }
    }
}
