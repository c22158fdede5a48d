//! Error handling utilities
//!
//! This module provides centralized error handling for the binary.

use crate::engine::errors::AggregationError;
use tracing::error;

/// Exit status for an error: 2 for configuration problems, 1 for the rest
pub fn exit_code(error: &anyhow::Error) -> i32 {
    match error.downcast_ref::<AggregationError>() {
        Some(e) if e.is_configuration_error() => 2,
        _ => 1,
    }
}

/// Report a fatal error and exit with the matching status code
///
/// - `verbose = 0`: the error message and, if known, a recovery hint
/// - `verbose >= 1`: also the full error chain
pub fn handle_fatal_error(error: anyhow::Error, verbose: u8) -> ! {
    error!("Fatal error: {}", error);

    eprintln!("Error: {error:#}");
    if let Some(hint) = error
        .downcast_ref::<AggregationError>()
        .and_then(AggregationError::recovery_hint)
    {
        eprintln!("Hint: {hint}");
    }

    if verbose >= 1 {
        eprintln!("\nError chain:");
        for (i, cause) in error.chain().enumerate() {
            eprintln!("  {}: {}", i, cause);
        }
    }

    std::process::exit(exit_code(&error))
}
