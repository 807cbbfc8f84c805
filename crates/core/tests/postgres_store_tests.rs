//! PostgreSQL store integration tests
//!
//! Note: These tests require a running PostgreSQL database and are disabled
//! by default. Each test truncates the searchlog tables, so point
//! DATABASE_URL at a throwaway database and run them serially:
//! cargo test --test postgres_store_tests -- --ignored --test-threads=1

use chrono::{Duration, TimeZone, Utc};
use searchlog_core::config::DatabaseConfig;
use searchlog_core::store::LeaseGuard;
use searchlog_core::{
    ArticleOracle, ClientId, CoalescerConfig, EventLog, ManualClock, NewSearchEvent, PgStore,
    RunCommit, SearchIngestor, SearchIntent, SearchStatistic, SearchlogError, StatisticsStore,
    StatisticsWorker, TermFold,
};
use std::sync::Arc;

const ARTICLES: [&str; 6] = [
    "How do I cancel my subscription?",
    "How do I cancel my account?",
    "Can I upgrade my account?",
    "Can you help me?",
    "I don't know how to enroll a new person.",
    "Is it possible to generate new users?",
];

fn database_config() -> DatabaseConfig {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must point at a test database");
    DatabaseConfig {
        url,
        max_connections: 4,
        ..DatabaseConfig::default()
    }
}

async fn create_test_store(lease_key: i64) -> PgStore {
    searchlog_core::init_test_logger();

    let store = PgStore::connect(&database_config(), lease_key)
        .await
        .unwrap();
    store.migrate().await.unwrap();

    sqlx::query(
        "TRUNCATE articles, search_events, search_statistics, deferred_intents RESTART IDENTITY",
    )
    .execute(store.pool())
    .await
    .unwrap();

    for title in ARTICLES {
        store.add_article(title).await.unwrap();
    }
    store
}

fn row(term: &str, count: i64, article_count: i64, zero_article_count: i64) -> SearchStatistic {
    SearchStatistic {
        term: term.to_string(),
        count,
        article_count,
        zero_article_count,
    }
}

async fn append(store: &PgStore, client: &str, term: &str, submitted: bool) {
    let event = NewSearchEvent::new(ClientId::from(client), term, submitted, Utc::now()).unwrap();
    store.append(event).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_upsert_accumulates_counts_and_snapshots_articles() {
    let store = create_test_store(9001).await;

    let first = store.upsert(&TermFold::single("how", 3)).await.unwrap();
    assert_eq!(first, row("how", 1, 3, 0));

    let second = store
        .upsert(&TermFold {
            term: "how".to_string(),
            intents: 2,
            article_count: 0,
        })
        .await
        .unwrap();
    assert_eq!(second, row("how", 3, 0, 2));

    let third = store.upsert(&TermFold::single("how", 4)).await.unwrap();
    assert_eq!(third, row("how", 4, 4, 2));

    store.upsert(&TermFold::single("canvas", 0)).await.unwrap();
    assert_eq!(
        store.list().await.unwrap(),
        vec![row("canvas", 1, 0, 1), row("how", 4, 4, 2)]
    );

    assert_eq!(store.reset().await.unwrap(), 2);
    assert!(store.list().await.unwrap().is_empty());
}

#[tokio::test]
#[ignore]
async fn test_commit_is_all_or_nothing() {
    let store = create_test_store(9002).await;
    store.upsert(&TermFold::single("ghost", 0)).await.unwrap();
    append(&store, "10.0.0.1", "how", false).await;

    let pending = store.pending().await.unwrap();
    assert_eq!(pending.len(), 1);
    let draft = SearchIntent::draft(
        pending[0].client_id.clone(),
        pending[0].term.clone(),
        pending[0].timestamp,
    );

    // The second fold drives ghost below its zero-article count, which the
    // table constraint rejects after the first fold was already written.
    let failing = RunCommit {
        processed: vec![pending[0].id],
        folds: vec![
            TermFold::single("how", 3),
            TermFold {
                term: "ghost".to_string(),
                intents: -1,
                article_count: 2,
            },
        ],
        retired_deferred: Vec::new(),
        deferred: vec![draft.clone()],
    };
    let err = store.commit(failing).await.unwrap_err();
    assert!(matches!(err, SearchlogError::Database(_)));

    assert_eq!(store.pending().await.unwrap().len(), 1);
    assert!(store.deferred().await.unwrap().is_empty());
    assert_eq!(store.list().await.unwrap(), vec![row("ghost", 1, 0, 1)]);

    let valid = RunCommit {
        processed: vec![pending[0].id],
        folds: vec![TermFold::single("how", 3)],
        retired_deferred: Vec::new(),
        deferred: vec![draft.clone()],
    };
    store.commit(valid).await.unwrap();

    assert!(store.pending().await.unwrap().is_empty());
    let deferred = store.deferred().await.unwrap();
    assert_eq!(deferred.len(), 1);
    assert_eq!(deferred[0].intent, draft);
    assert_eq!(
        store.list().await.unwrap(),
        vec![row("ghost", 1, 0, 1), row("how", 1, 3, 0)]
    );

    let retire = RunCommit {
        retired_deferred: vec![deferred[0].id],
        ..RunCommit::default()
    };
    store.commit(retire).await.unwrap();
    assert!(store.deferred().await.unwrap().is_empty());
}

#[tokio::test]
#[ignore]
async fn test_lease_is_exclusive_until_released() {
    let store = create_test_store(9003).await;
    let other_process = PgStore::connect(&database_config(), 9003).await.unwrap();

    let lease = store.try_lease().await.unwrap().expect("lease should be free");
    assert!(store.try_lease().await.unwrap().is_none());
    assert!(other_process.try_lease().await.unwrap().is_none());

    lease.release().await.unwrap();

    let lease = other_process
        .try_lease()
        .await
        .unwrap()
        .expect("lease should be free after release");
    assert!(store.try_lease().await.unwrap().is_none());
    lease.release().await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_wildcard_characters_match_literally() {
    let store = create_test_store(9005).await;
    store.add_article("Save 100% on yearly plans").await.unwrap();
    store.add_article("Naming fields in snake_case").await.unwrap();

    let percent = store.matching("100%").await.unwrap();
    assert_eq!(percent.len(), 1);
    assert_eq!(percent[0].title, "Save 100% on yearly plans");

    assert_eq!(store.match_count("%").await.unwrap(), 1);
    assert_eq!(store.match_count("_").await.unwrap(), 1);
    assert_eq!(store.match_count("e_c").await.unwrap(), 1);
    assert_eq!(store.match_count("a\\b").await.unwrap(), 0);

    let titles: Vec<String> = store
        .matching("HOW")
        .await
        .unwrap()
        .into_iter()
        .map(|article| article.title)
        .collect();
    assert_eq!(titles, vec![ARTICLES[0], ARTICLES[1], ARTICLES[4]]);
}

#[tokio::test]
#[ignore]
async fn test_schema_rejects_blank_terms() {
    let store = create_test_store(9006).await;

    let result = sqlx::query(
        "INSERT INTO search_events (client_id, term, searched_at) VALUES ('10.0.0.1', '   ', now())",
    )
    .execute(store.pool())
    .await;

    assert!(result.is_err());
    assert!(store.pending().await.unwrap().is_empty());
}

#[tokio::test]
#[ignore]
async fn test_worker_folds_backlog_once() {
    let store = Arc::new(create_test_store(9007).await);
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 4, 7, 17, 12, 28).unwrap());
    let ingestor = SearchIngestor::new(store.clone(), store.clone(), Arc::new(clock.clone()));
    let worker = StatisticsWorker::new(store.clone(), store.clone(), CoalescerConfig::default());

    for term in ["canvas", "roses", "straw", "canvas"] {
        ingestor
            .search(ClientId::from("10.0.0.1"), term, true)
            .await
            .unwrap();
        clock.advance(Duration::milliseconds(50));
    }
    ingestor
        .search(ClientId::from("10.0.0.2"), "how", false)
        .await
        .unwrap();

    let outcome = worker.run_once().await.unwrap();
    let report = outcome.report().expect("run should complete");
    assert_eq!(report.events, 5);

    let expected = vec![
        row("canvas", 2, 0, 2),
        row("how", 1, 3, 0),
        row("roses", 1, 0, 1),
        row("straw", 1, 0, 1),
    ];
    assert_eq!(store.list().await.unwrap(), expected);

    let rerun = worker.run_once().await.unwrap();
    assert_eq!(rerun.report().map(|report| report.events), Some(0));
    assert_eq!(store.list().await.unwrap(), expected);
}
