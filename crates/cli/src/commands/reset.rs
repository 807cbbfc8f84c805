//! Reset command implementation

use clap::Args;
use searchlog_core::{Result, SearchlogConfig, SearchlogError, StatisticsStore, Storage};

use crate::commands::CliCommand;
use crate::output::{OutputFormat, OutputFormatter};

/// Delete all search statistics
///
/// The raw event log is left untouched and already processed events are
/// not folded again.
#[derive(Debug, Default, Args)]
pub struct ResetCommand {
    /// Confirm the deletion
    #[arg(long)]
    pub yes: bool,
}

impl CliCommand for ResetCommand {
    async fn execute(&self, config: &SearchlogConfig) -> Result<()> {
        let storage = Storage::open(config).await?;
        let removed = storage.stats.reset().await?;

        OutputFormatter::new(OutputFormat::Table)
            .success(&format!("Removed {} search statistics", removed))?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "reset"
    }

    fn validate(&self) -> Result<()> {
        if !self.yes {
            return Err(SearchlogError::validation(
                "Refusing to delete statistics without --yes",
            ));
        }
        Ok(())
    }
}
