//! CLI commands module

use searchlog_core::{Result, SearchlogConfig};

pub mod migrate;
pub mod reset;
pub mod serve;
pub mod stats;
pub mod work;

pub use migrate::*;
pub use reset::*;
pub use serve::*;
pub use stats::*;
pub use work::*;

/// Base trait for CLI commands
#[allow(async_fn_in_trait)]
pub trait CliCommand {
    /// Execute the command against the loaded configuration
    async fn execute(&self, config: &SearchlogConfig) -> Result<()>;

    /// Get command name for logging
    fn name(&self) -> &'static str;

    /// Validate command arguments
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

/// Common command execution wrapper
pub async fn execute_command<T: CliCommand>(command: T, config: &SearchlogConfig) -> Result<()> {
    tracing::info!("Executing command: {}", command.name());

    command.validate()?;
    command.execute(config).await?;

    tracing::info!("Command {} completed successfully", command.name());
    Ok(())
}
