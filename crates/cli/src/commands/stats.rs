//! Stats command implementation

use clap::Args;
use searchlog_core::{Result, SearchStatistic, SearchlogConfig, StatisticsStore, Storage};
use std::io::Write;

use crate::commands::CliCommand;
use crate::output::{OutputFormat, OutputFormatter};

/// Show search statistics
#[derive(Debug, Default, Args)]
pub struct StatsCommand {
    /// Only show terms whose searches never matched an article
    #[arg(long)]
    pub zero_only: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    pub output: OutputFormat,
}

impl StatsCommand {
    /// Writes the statistics rows to `formatter`
    pub async fn render<W: Write>(
        &self,
        stats: &dyn StatisticsStore,
        formatter: &mut OutputFormatter<W>,
    ) -> Result<Vec<SearchStatistic>> {
        let mut rows = stats.list().await?;
        if self.zero_only {
            rows.retain(|row| row.zero_article_count > 0);
        }

        formatter.output(&rows)?;
        Ok(rows)
    }
}

impl CliCommand for StatsCommand {
    async fn execute(&self, config: &SearchlogConfig) -> Result<()> {
        let storage = Storage::open(config).await?;
        let mut formatter = OutputFormatter::new(self.output);
        let rows = self.render(storage.stats.as_ref(), &mut formatter).await?;

        tracing::debug!("Listed {} statistic rows", rows.len());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "stats"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use searchlog_core::{MemoryStore, TermFold};

    #[tokio::test]
    async fn test_render_filters_zero_article_terms() {
        let store = MemoryStore::new();
        store.upsert(&TermFold::single("canvas", 0)).await.unwrap();
        store.upsert(&TermFold::single("how", 3)).await.unwrap();

        let command = StatsCommand {
            zero_only: true,
            output: OutputFormat::Compact,
        };
        let mut formatter = OutputFormatter::with_writer(OutputFormat::Compact, Vec::new());
        let rows = command.render(&store, &mut formatter).await.unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].term, "canvas");

        let output = String::from_utf8(formatter.into_inner()).unwrap();
        assert!(output.contains("\"term\":\"canvas\""));
        assert!(!output.contains("\"how\""));
    }
}
