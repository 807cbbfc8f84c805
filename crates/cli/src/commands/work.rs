//! Work command implementation

use clap::Args;
use searchlog_core::{
    Result, SearchlogConfig, SearchlogError, StatisticsWorker, Storage, StorageBackend,
    WorkerOutcome,
};
use std::sync::Arc;
use std::time::Duration;

use crate::commands::CliCommand;
use crate::output::{OutputFormat, OutputFormatter};

/// Fold pending search events into statistics
#[derive(Debug, Default, Args)]
pub struct WorkCommand {
    /// Keep running every N seconds until interrupted
    #[arg(long, value_name = "SECS")]
    pub every: Option<u64>,

    /// Output format for the run report
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    pub output: OutputFormat,
}

impl WorkCommand {
    /// Runs the worker once and prints what happened
    pub async fn run(&self, storage: Storage, config: &SearchlogConfig) -> Result<WorkerOutcome> {
        let worker = StatisticsWorker::new(storage.log, storage.oracle, config.coalescer.clone());
        let outcome = worker.run_once().await?;

        let mut formatter = OutputFormatter::new(self.output);
        match &outcome {
            WorkerOutcome::Completed(report) => formatter.output(report)?,
            WorkerOutcome::Skipped => {
                formatter.message("Another statistics run is in progress, skipped")?
            }
        }
        Ok(outcome)
    }
}

impl CliCommand for WorkCommand {
    async fn execute(&self, config: &SearchlogConfig) -> Result<()> {
        if config.database.backend == StorageBackend::Memory {
            tracing::warn!("In-memory storage starts empty; nothing will be folded");
        }

        let storage = Storage::open(config).await?;

        let Some(secs) = self.every else {
            self.run(storage, config).await?;
            return Ok(());
        };

        let worker = Arc::new(StatisticsWorker::new(
            storage.log,
            storage.oracle,
            config.coalescer.clone(),
        ));
        let handle = worker.spawn_periodic(Duration::from_secs(secs));

        tokio::signal::ctrl_c()
            .await
            .map_err(|e| SearchlogError::invalid_state(format!("Signal handler failed: {}", e)))?;
        tracing::info!("Interrupted, stopping statistics worker");
        handle.abort();
        Ok(())
    }

    fn name(&self) -> &'static str {
        "work"
    }

    fn validate(&self) -> Result<()> {
        if self.every == Some(0) {
            return Err(SearchlogError::validation(
                "Worker interval must be greater than zero",
            ));
        }
        Ok(())
    }
}
