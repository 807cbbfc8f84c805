//! HTTP handlers for Searchlog serve crate

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts, Query, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Json, Redirect, Response},
};
use searchlog_core::{
    config::ServerConfig, Article, ClientId, Clock, SearchIngestor, SearchStatistic,
    SearchlogError, StatisticsStore, StatisticsWorker, Storage, SystemClock, WorkerOutcome,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;

/// Path of the statistics view
pub const STATISTICS_PATH: &str = "/search/statistics";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub ingestor: SearchIngestor,
    pub stats: Arc<dyn StatisticsStore>,
    pub worker: Arc<StatisticsWorker>,
    pub config: ServerConfig,
}

impl AppState {
    /// Builds the state over an opened storage backend
    pub fn new(
        storage: Storage,
        clock: Arc<dyn Clock>,
        worker: Arc<StatisticsWorker>,
        config: ServerConfig,
    ) -> Self {
        Self {
            ingestor: SearchIngestor::new(storage.log, storage.oracle, clock),
            stats: storage.stats,
            worker,
            config,
        }
    }

    /// Builds the state with the wall clock and a worker over the same storage
    pub fn with_system_clock(
        storage: Storage,
        coalescer: searchlog_core::CoalescerConfig,
        config: ServerConfig,
    ) -> Self {
        let worker = Arc::new(StatisticsWorker::new(
            storage.log.clone(),
            storage.oracle.clone(),
            coalescer,
        ));
        Self::new(storage, Arc::new(SystemClock), worker, config)
    }
}

/// Error returned by handlers
#[derive(Debug)]
pub struct ApiError(SearchlogError);

impl From<SearchlogError> for ApiError {
    fn from(err: SearchlogError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            SearchlogError::Validation { .. } => StatusCode::BAD_REQUEST,
            SearchlogError::NotFound { .. } => StatusCode::NOT_FOUND,
            e if e.is_retryable() => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(category = %self.0.category(), "Request failed: {}", self.0);
        }

        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
                details: Some(self.0.category().to_string()),
            }),
        )
            .into_response()
    }
}

/// Identity of the requesting client
///
/// Taken from the first `X-Forwarded-For` entry when the server trusts it,
/// otherwise from the peer address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAddress(pub ClientId);

#[async_trait]
impl FromRequestParts<AppState> for ClientAddress {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if state.config.trust_forwarded_for {
            let forwarded = parts
                .headers
                .get("x-forwarded-for")
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.split(',').next())
                .map(str::trim)
                .filter(|value| !value.is_empty());

            if let Some(client) = forwarded {
                return Ok(Self(ClientId::from(client)));
            }
        }

        match parts.extensions.get::<ConnectInfo<SocketAddr>>() {
            Some(ConnectInfo(addr)) => Ok(Self(ClientId::new(addr.ip().to_string()))),
            None => {
                tracing::warn!("No peer address for request, using shared client id");
                Ok(Self(ClientId::from("unknown")))
            }
        }
    }
}

/// Handler for logging a search and returning matching articles
pub async fn handle_search(
    State(state): State<AppState>,
    ClientAddress(client_id): ClientAddress,
    Query(params): Query<SearchQueryParams>,
) -> Result<Json<Vec<Article>>, ApiError> {
    let term = params.term.unwrap_or_default();
    let submitted = params.submit.unwrap_or(false);

    tracing::debug!(client_id = %client_id, submitted, "Search request");

    let (_event, articles) = state.ingestor.search(client_id, &term, submitted).await?;
    Ok(Json(articles))
}

/// Handler for listing search statistics
pub async fn handle_list_statistics(
    State(state): State<AppState>,
) -> Result<Json<Vec<SearchStatistic>>, ApiError> {
    Ok(Json(state.stats.list().await?))
}

/// Handler for clearing search statistics
pub async fn handle_reset_statistics(
    State(state): State<AppState>,
) -> Result<Redirect, ApiError> {
    let removed = state.stats.reset().await?;
    tracing::info!("Cleared {} search statistics", removed);
    Ok(Redirect::to(STATISTICS_PATH))
}

/// Handler for triggering a statistics run
pub async fn handle_run_worker(
    State(state): State<AppState>,
) -> Result<Json<WorkerRunResponse>, ApiError> {
    let response = match state.worker.run_once().await? {
        WorkerOutcome::Completed(report) => WorkerRunResponse {
            status: "completed".to_string(),
            report: Some(report),
        },
        WorkerOutcome::Skipped => WorkerRunResponse {
            status: "skipped".to_string(),
            report: None,
        },
    };
    Ok(Json(response))
}

/// Handler for server health check
pub async fn handle_health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: crate::VERSION.to_string(),
        timestamp: chrono::Utc::now(),
    })
}

// Request types

/// Query parameters for `GET /search`
#[derive(Debug, Deserialize)]
pub struct SearchQueryParams {
    pub term: Option<String>,
    pub submit: Option<bool>,
}

// Response types

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub details: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WorkerRunResponse {
    pub status: String,
    pub report: Option<searchlog_core::RunReport>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}
