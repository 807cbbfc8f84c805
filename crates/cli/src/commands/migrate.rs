//! Migrate command implementation

use clap::Args;
use searchlog_core::{PgStore, Result, SearchlogConfig, SearchlogError, StorageBackend};

use crate::commands::CliCommand;
use crate::output::{OutputFormat, OutputFormatter};

/// Apply the database schema migrations
#[derive(Debug, Default, Args)]
pub struct MigrateCommand {}

impl CliCommand for MigrateCommand {
    async fn execute(&self, config: &SearchlogConfig) -> Result<()> {
        if config.database.backend != StorageBackend::Postgres {
            return Err(SearchlogError::config(
                "Migrations need the postgres backend (database.backend: postgres)",
            ));
        }

        let store = PgStore::connect(&config.database, config.worker.lease_key).await?;
        store.migrate().await?;

        OutputFormatter::new(OutputFormat::Table).success("Database schema is up to date")?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "migrate"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_backend_is_rejected() {
        let result = MigrateCommand {}
            .execute(&SearchlogConfig::default())
            .await;

        assert!(matches!(
            result,
            Err(SearchlogError::InvalidConfig { .. })
        ));
    }
}
