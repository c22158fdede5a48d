//! Structured error types for aggregation runs
//!
//! Every error is fatal to the run that raised it. Variants carry the chunk
//! index (where one exists) and the underlying cause so callers can tell which
//! slice of the input triggered the failure.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for aggregation operations
#[derive(Debug, Error)]
pub enum AggregationError {
    // Configuration errors
    #[error("Invalid aggregation configuration: {field} = {value}: {reason}")]
    InvalidConfiguration {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to load configuration from {path}: {reason}")]
    ConfigLoad {
        path: PathBuf,
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // Worker errors
    #[error("Chunk {chunk_index} contains no records")]
    EmptyChunk { chunk_index: usize },

    #[error("Worker for chunk {chunk_index} failed: {cause}")]
    WorkerFailure {
        chunk_index: usize,
        cause: WorkerFailureCause,
    },

    // Result store errors
    #[error("Incomplete results: expected {expected} chunks, missing {missing:?}")]
    IncompleteResults { expected: usize, missing: Vec<usize> },

    #[error("Chunk {chunk_index} reported more than once")]
    DuplicateResult { chunk_index: usize },

    #[error("Chunk {chunk_index} is outside the run's {chunk_count} chunks")]
    UnknownChunk {
        chunk_index: usize,
        chunk_count: usize,
    },
}

/// Why a worker failed to produce its partial aggregate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum WorkerFailureCause {
    /// Checked arithmetic on an aggregate field overflowed
    Overflow { field: String },
    /// A record fell outside the configured number domain
    InvalidRecord { id: i64, number: i64, reason: String },
    /// Record IDs were not strictly increasing
    RecordOrder { previous_id: i64, id: i64 },
    /// The worker was handed a chunk with no records
    EmptyChunk,
    /// The execution unit panicked
    Panicked { message: String },
    /// The execution unit was cancelled before reporting
    Cancelled,
    /// The join barrier timed out with chunks still unreported
    ///
    /// The failure's chunk index is the lowest entry of `outstanding`. Under a
    /// bounded pool that chunk may still have been waiting for a worker slot,
    /// so it is not necessarily the one that stalled.
    TimedOut {
        #[serde(with = "humantime_serde")]
        after: Duration,
        outstanding: Vec<usize>,
    },
}

impl fmt::Display for WorkerFailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overflow { field } => write!(f, "arithmetic overflow in {}", field),
            Self::InvalidRecord { id, number, reason } => {
                write!(f, "invalid record id={} number={}: {}", id, number, reason)
            }
            Self::RecordOrder { previous_id, id } => write!(
                f,
                "record ids out of order: {} does not follow {}",
                id, previous_id
            ),
            Self::EmptyChunk => write!(f, "empty chunk"),
            Self::Panicked { message } => write!(f, "worker panicked: {}", message),
            Self::Cancelled => write!(f, "worker cancelled"),
            Self::TimedOut { after, outstanding } => write!(
                f,
                "timed out after {} with chunks {:?} outstanding",
                humantime_serde::re::humantime::format_duration(*after),
                outstanding
            ),
        }
    }
}

impl AggregationError {
    /// Shorthand for a configuration error
    pub fn invalid_config(
        field: impl Into<String>,
        value: impl fmt::Display,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidConfiguration {
            field: field.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a worker failure
    pub fn worker_failure(chunk_index: usize, cause: WorkerFailureCause) -> Self {
        Self::WorkerFailure { chunk_index, cause }
    }

    /// The chunk this error is attributed to, if any
    pub fn chunk_index(&self) -> Option<usize> {
        match self {
            Self::EmptyChunk { chunk_index }
            | Self::WorkerFailure { chunk_index, .. }
            | Self::DuplicateResult { chunk_index }
            | Self::UnknownChunk { chunk_index, .. } => Some(*chunk_index),
            Self::IncompleteResults { missing, .. } => missing.first().copied(),
            Self::InvalidConfiguration { .. } | Self::ConfigLoad { .. } => None,
        }
    }

    /// Check if re-running with different limits could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::WorkerFailure {
                cause: WorkerFailureCause::TimedOut { .. },
                ..
            }
        )
    }

    /// True for errors caused by bad configuration rather than bad data
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfiguration { .. } | Self::ConfigLoad { .. }
        )
    }

    /// Get recovery hint for the error
    pub fn recovery_hint(&self) -> Option<String> {
        match self {
            Self::InvalidConfiguration { field, .. } => {
                Some(format!("Check configuration field '{}'", field))
            }
            Self::ConfigLoad { path, .. } => Some(format!(
                "Verify that {} exists and is valid TOML",
                path.display()
            )),
            Self::WorkerFailure {
                cause: WorkerFailureCause::TimedOut { .. },
                ..
            } => Some("Increase the timeout or the number of workers".to_string()),
            Self::WorkerFailure {
                chunk_index,
                cause: WorkerFailureCause::InvalidRecord { id, .. },
            } => Some(format!(
                "Inspect record {} in chunk {} or widen the number domain",
                id, chunk_index
            )),
            Self::WorkerFailure {
                cause: WorkerFailureCause::Overflow { .. },
                ..
            } => Some("Input values are too large to sum in 64 bits".to_string()),
            _ => None,
        }
    }

    /// Get variant name for error categorization
    pub fn variant_name(&self) -> &'static str {
        match self {
            Self::InvalidConfiguration { .. } => "InvalidConfiguration",
            Self::ConfigLoad { .. } => "ConfigLoad",
            Self::EmptyChunk { .. } => "EmptyChunk",
            Self::WorkerFailure { .. } => "WorkerFailure",
            Self::IncompleteResults { .. } => "IncompleteResults",
            Self::DuplicateResult { .. } => "DuplicateResult",
            Self::UnknownChunk { .. } => "UnknownChunk",
        }
    }
}

/// Result type alias for aggregation operations
pub type AggregationResult<T> = Result<T, AggregationError>;
