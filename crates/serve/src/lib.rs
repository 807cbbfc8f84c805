//! Searchlog Serve Library
//!
//! HTTP interface for Searchlog: search logging, the statistics view and
//! its reset, plus an on-demand worker trigger.

pub mod api;
pub mod handlers;
pub mod server;

pub use handlers::{AppState, ApiError, ClientAddress, ErrorResponse, STATISTICS_PATH};
pub use server::{create_app, SearchlogServer, ServerBuilder};

/// Server version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
