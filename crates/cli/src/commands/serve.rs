//! Serve command implementation

use clap::Args;
use searchlog_core::{Result, SearchlogConfig, SearchlogError};
use searchlog_serve::ServerBuilder;

use crate::commands::CliCommand;

/// Start the Searchlog web server
#[derive(Debug, Default, Args)]
pub struct ServeCommand {
    /// Host address to bind to (overrides the configuration)
    #[arg(short = 'H', long)]
    pub host: Option<String>,

    /// Port to bind to (overrides the configuration)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Run the statistics worker every N seconds inside the server
    #[arg(long, value_name = "SECS")]
    pub worker_interval: Option<u64>,

    /// Disable CORS
    #[arg(long)]
    pub no_cors: bool,
}

impl ServeCommand {
    fn builder(&self, config: &SearchlogConfig) -> ServerBuilder {
        let mut builder = ServerBuilder::from_config(config.clone());
        if let Some(host) = &self.host {
            builder = builder.host(host.clone());
        }
        if let Some(port) = self.port {
            builder = builder.port(port);
        }
        if let Some(secs) = self.worker_interval {
            builder = builder.worker_interval_secs(secs);
        }
        if self.no_cors {
            builder = builder.cors(false);
        }
        builder
    }
}

impl CliCommand for ServeCommand {
    async fn execute(&self, config: &SearchlogConfig) -> Result<()> {
        let server = self.builder(config).build().await?;

        tracing::info!(
            "Searchlog server starting on http://{}:{}",
            server.config().host,
            server.config().port
        );
        server.start().await
    }

    fn name(&self) -> &'static str {
        "serve"
    }

    fn validate(&self) -> Result<()> {
        if self.port == Some(0) {
            return Err(SearchlogError::validation("Port cannot be 0"));
        }

        if self.worker_interval == Some(0) {
            return Err(SearchlogError::validation(
                "Worker interval must be greater than zero",
            ));
        }

        Ok(())
    }
}
