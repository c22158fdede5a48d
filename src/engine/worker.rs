//! Per-chunk partial aggregation
//!
//! A worker sees exactly one chunk and never touches the result store or
//! another worker's data. It either returns the chunk's partial aggregate or
//! the reason it could not.

use super::errors::{AggregationError, AggregationResult, WorkerFailureCause};
use super::types::{Chunk, PartialAggregate, Record};
use crate::config::{EngineConfig, NumberDomain};

/// Record checks applied while aggregating
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerOptions {
    /// Reject numbers outside this inclusive range
    pub number_domain: Option<NumberDomain>,
    /// Reject records whose ID does not exceed the one before it, including
    /// the last record of the previous chunk
    pub validate_record_order: bool,
}

impl From<&EngineConfig> for WorkerOptions {
    fn from(config: &EngineConfig) -> Self {
        Self {
            number_domain: config.number_domain,
            validate_record_order: config.validate_record_order,
        }
    }
}

/// Computes the partial aggregate for one chunk
///
/// Implementations run on a blocking thread and must be pure with respect to
/// the chunk they are given.
pub trait PartialWorker: Send + Sync + 'static {
    fn compute(&self, chunk: &Chunk) -> AggregationResult<PartialAggregate>;
}

/// The standard worker: sum, min, max and parity counts
#[derive(Debug, Clone, Default)]
pub struct AggregateWorker {
    options: WorkerOptions,
}

impl AggregateWorker {
    pub fn new(options: WorkerOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &WorkerOptions {
        &self.options
    }
}

impl PartialWorker for AggregateWorker {
    fn compute(&self, chunk: &Chunk) -> AggregationResult<PartialAggregate> {
        compute_partial(chunk, &self.options)
    }
}

/// Aggregate every record in `chunk`
pub fn compute_partial(chunk: &Chunk, options: &WorkerOptions) -> AggregationResult<PartialAggregate> {
    let index = chunk.index();
    let mut records = chunk.records().iter();
    let Some(first) = records.next() else {
        return Err(AggregationError::EmptyChunk { chunk_index: index });
    };

    check_record(index, first, chunk.preceding(), options)?;
    let mut acc = PartialAggregate::of(first);
    let mut previous = first;

    for record in records {
        check_record(index, record, Some(previous), options)?;
        acc.push(record).map_err(|overflow| {
            AggregationError::worker_failure(
                index,
                WorkerFailureCause::Overflow {
                    field: overflow.field.to_string(),
                },
            )
        })?;
        previous = record;
    }

    Ok(acc)
}

fn check_record(
    chunk_index: usize,
    record: &Record,
    previous: Option<&Record>,
    options: &WorkerOptions,
) -> AggregationResult<()> {
    if let Some(domain) = options.number_domain {
        if let Some(reason) = domain.violation(record.number) {
            return Err(AggregationError::worker_failure(
                chunk_index,
                WorkerFailureCause::InvalidRecord {
                    id: record.id,
                    number: record.number,
                    reason,
                },
            ));
        }
    }

    if options.validate_record_order {
        if let Some(prev) = previous {
            if record.id <= prev.id {
                return Err(AggregationError::worker_failure(
                    chunk_index,
                    WorkerFailureCause::RecordOrder {
                        previous_id: prev.id,
                        id: record.id,
                    },
                ));
            }
        }
    }

    Ok(())
}
