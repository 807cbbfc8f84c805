//! Statistics worker
//!
//! One run drains the backlog of unprocessed search events, coalesces it into
//! intents, folds the intents into per-term statistics and commits the result
//! together with the processed marks. Runs are single-flight: within the
//! process through a mutex, across processes through the store lease.

use crate::aggregator::Aggregator;
use crate::coalescer::{CoalescerConfig, SessionCoalescer};
use crate::error::Result;
use crate::store::{ArticleOracle, EventLog, RunCommit};
use crate::types::SearchIntent;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Summary of one completed run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    /// Raw events consumed
    pub events: usize,
    /// Intents produced by coalescing
    pub intents: usize,
    /// Previously deferred intents retried
    pub retried: usize,
    /// Intents folded into statistics
    pub folded: i64,
    /// Distinct terms updated
    pub terms: usize,
    /// Intents deferred to a later run
    pub deferred: usize,
    pub duration_ms: u64,
}

impl RunReport {
    fn empty(run_id: Uuid) -> Self {
        Self {
            run_id,
            events: 0,
            intents: 0,
            retried: 0,
            folded: 0,
            terms: 0,
            deferred: 0,
            duration_ms: 0,
        }
    }
}

/// What a call to [`StatisticsWorker::run_once`] did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerOutcome {
    Completed(RunReport),
    /// Another run was in progress
    Skipped,
}

impl WorkerOutcome {
    pub fn report(&self) -> Option<&RunReport> {
        match self {
            Self::Completed(report) => Some(report),
            Self::Skipped => None,
        }
    }
}

/// Batch worker that turns the raw event log into search statistics
#[derive(Clone)]
pub struct StatisticsWorker {
    log: Arc<dyn EventLog>,
    aggregator: Aggregator,
    config: CoalescerConfig,
    running: Arc<Mutex<()>>,
}

impl std::fmt::Debug for StatisticsWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatisticsWorker")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl StatisticsWorker {
    /// Creates a worker over the given event log and article oracle
    pub fn new(
        log: Arc<dyn EventLog>,
        oracle: Arc<dyn ArticleOracle>,
        config: CoalescerConfig,
    ) -> Self {
        Self {
            log,
            aggregator: Aggregator::new(oracle),
            config,
            running: Arc::new(Mutex::new(())),
        }
    }

    pub fn config(&self) -> &CoalescerConfig {
        &self.config
    }

    /// Runs one batch over the current backlog
    ///
    /// Returns [`WorkerOutcome::Skipped`] without touching anything when
    /// another run holds the in-process guard or the store lease.
    ///
    /// # Errors
    ///
    /// A failed load or commit is returned as is. Nothing of the run is
    /// applied in that case and the events stay pending for the next run.
    pub async fn run_once(&self) -> Result<WorkerOutcome> {
        let Ok(_guard) = self.running.try_lock() else {
            info!("Statistics run already in progress, skipping");
            return Ok(WorkerOutcome::Skipped);
        };

        let Some(lease) = self.log.try_lease().await? else {
            info!("Statistics lease held by another worker, skipping");
            return Ok(WorkerOutcome::Skipped);
        };

        let run_id = Uuid::new_v4();
        let result = self
            .process(run_id)
            .instrument(info_span!("statistics_run", %run_id))
            .await;

        if let Err(e) = lease.release().await {
            warn!(%run_id, "Failed to release statistics lease: {}", e);
        }

        result.map(WorkerOutcome::Completed)
    }

    async fn process(&self, run_id: Uuid) -> Result<RunReport> {
        let started = Instant::now();

        let events = self.log.pending().await?;
        let deferred = self.log.deferred().await?;

        if events.is_empty() && deferred.is_empty() {
            info!("No pending search events");
            return Ok(RunReport::empty(run_id));
        }

        let intents = SessionCoalescer::new(self.config.clone()).coalesce(&events);
        let intent_count = intents.len();

        let retired_deferred: Vec<i64> = deferred.iter().map(|d| d.id).collect();
        let mut batch: Vec<SearchIntent> = deferred.into_iter().map(|d| d.intent).collect();
        let retried = batch.len();
        batch.extend(intents);

        let aggregation = self.aggregator.aggregate(batch).await;

        let mut report = RunReport {
            run_id,
            events: events.len(),
            intents: intent_count,
            retried,
            folded: aggregation.intents_folded(),
            terms: aggregation.folds.len(),
            deferred: aggregation.deferred.len(),
            duration_ms: 0,
        };

        self.log
            .commit(RunCommit {
                processed: events.iter().map(|event| event.id).collect(),
                folds: aggregation.folds,
                retired_deferred,
                deferred: aggregation.deferred,
            })
            .await?;

        report.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            events = report.events,
            intents = report.intents,
            terms = report.terms,
            deferred = report.deferred,
            duration_ms = report.duration_ms,
            "Statistics run completed"
        );

        Ok(report)
    }

    /// Runs the worker every `interval` until the task is aborted
    ///
    /// Failed runs are logged and retried on the next tick.
    pub fn spawn_periodic(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            info!("Statistics worker scheduled every {:?}", interval);
            loop {
                ticker.tick().await;
                if let Err(e) = self.run_once().await {
                    error!(
                        retryable = e.is_retryable(),
                        "Statistics run failed: {}",
                        e
                    );
                }
            }
        })
    }
}
