//! API routes for Searchlog serve crate

use crate::handlers::{
    handle_health_check, handle_list_statistics, handle_reset_statistics, handle_run_worker,
    handle_search, AppState, STATISTICS_PATH,
};
use axum::{
    routing::{get, post},
    Router,
};

/// API routes configuration
pub fn create_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handle_health_check))
        .route("/search", get(handle_search))
        .route(
            STATISTICS_PATH,
            get(handle_list_statistics).delete(handle_reset_statistics),
        )
        .route("/worker/run", post(handle_run_worker))
}
