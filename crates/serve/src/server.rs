//! Server module for Searchlog serve crate

use crate::api::create_routes;
use crate::handlers::AppState;
use axum::{
    http::{
        header::{ACCEPT, CONTENT_TYPE},
        Method,
    },
    Router,
};
use searchlog_core::config::ServerConfig;
use searchlog_core::{Result, SearchlogConfig, SearchlogError, Storage};
use std::net::SocketAddr;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

/// Searchlog HTTP server
pub struct SearchlogServer {
    config: ServerConfig,
    worker_interval: Option<Duration>,
    state: AppState,
}

impl SearchlogServer {
    /// Create a server over already built state
    pub fn new(config: ServerConfig, state: AppState) -> Self {
        Self {
            config,
            worker_interval: None,
            state,
        }
    }

    /// Open the configured storage and build the server around it
    pub async fn from_config(config: &SearchlogConfig) -> Result<Self> {
        let storage = Storage::open(config).await?;
        let state = AppState::with_system_clock(
            storage,
            config.coalescer.clone(),
            config.server.clone(),
        );

        let server = Self::new(config.server.clone(), state);
        Ok(match config.worker.interval_secs {
            Some(secs) => server.with_worker_interval(Duration::from_secs(secs)),
            None => server,
        })
    }

    /// Run the statistics worker in the background every `interval`
    pub fn with_worker_interval(mut self, interval: Duration) -> Self {
        self.worker_interval = Some(interval);
        self
    }

    /// Start the server
    pub async fn start(self) -> Result<()> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let socket_addr: SocketAddr = addr
            .parse()
            .map_err(|e| SearchlogError::validation(format!("Invalid address {}: {}", addr, e)))?;

        let worker = self
            .worker_interval
            .map(|interval| self.state.worker.clone().spawn_periodic(interval));

        tracing::info!("Starting Searchlog server on {}", addr);

        let listener = tokio::net::TcpListener::bind(socket_addr)
            .await
            .map_err(|e| SearchlogError::network(format!("Failed to bind to {}: {}", addr, e)))?;

        let app = create_app(self.state, &self.config);
        let served = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .map_err(|e| SearchlogError::network(format!("Server error: {}", e)));

        if let Some(handle) = worker {
            handle.abort();
        }

        served
    }

    /// Get the server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// Create the Axum application with middleware
pub fn create_app(state: AppState, config: &ServerConfig) -> Router {
    let mut app = create_routes().with_state(state);

    app = app.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(RequestBodyLimitLayer::new(config.max_request_size)),
    );

    if config.cors_enabled {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::DELETE])
            .allow_headers([ACCEPT, CONTENT_TYPE]);

        app = app.layer(cors);
    }

    app
}

/// Server builder for configuration
pub struct ServerBuilder {
    config: SearchlogConfig,
}

impl ServerBuilder {
    /// Create a new server builder
    pub fn new() -> Self {
        Self {
            config: SearchlogConfig::default(),
        }
    }

    /// Start from a loaded configuration
    pub fn from_config(config: SearchlogConfig) -> Self {
        Self { config }
    }

    /// Set the host address
    pub fn host<S: Into<String>>(mut self, host: S) -> Self {
        self.config.server.host = host.into();
        self
    }

    /// Set the port
    pub fn port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    /// Enable or disable CORS
    pub fn cors(mut self, enabled: bool) -> Self {
        self.config.server.cors_enabled = enabled;
        self
    }

    /// Set maximum request size
    pub fn max_request_size(mut self, size: usize) -> Self {
        self.config.server.max_request_size = size;
        self
    }

    /// Run the worker in the background every `secs` seconds
    pub fn worker_interval_secs(mut self, secs: u64) -> Self {
        self.config.worker.interval_secs = Some(secs);
        self
    }

    /// Build the server with async initialization
    pub async fn build(self) -> Result<SearchlogServer> {
        self.config.validate()?;
        SearchlogServer::from_config(&self.config).await
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
