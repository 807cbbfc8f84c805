//! Searchlog CLI Library
//!
//! Command-line interface components for Searchlog.

use searchlog_core::{Result, SearchlogError};

pub mod commands;
pub mod output;

pub use commands::*;
pub use output::*;

/// CLI version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the CLI environment
pub fn init() -> Result<()> {
    std::panic::set_hook(Box::new(|info| {
        eprintln!("Searchlog CLI encountered an error: {}", info);
    }));

    Ok(())
}

/// Get the appropriate exit code for an error
pub fn exit_code_for_error(error: &SearchlogError) -> i32 {
    match error {
        SearchlogError::Validation { .. } => 2,
        SearchlogError::InvalidConfig { .. } | SearchlogError::Config(_) => 3,
        SearchlogError::NotFound { .. } => 4,
        SearchlogError::Network { .. } => 5,
        SearchlogError::Database(_) | SearchlogError::Migration(_) => 6,
        SearchlogError::Oracle { .. } => 7,
        _ => 1,
    }
}
