//! Splitting the record sequence into contiguous chunks

use super::errors::{AggregationError, AggregationResult};
use super::types::{Chunk, Record};
use std::ops::Range;
use std::sync::Arc;
use tracing::debug;

/// Plan the half-open index ranges for `total` records
///
/// Produces `ceil(total / chunk_size)` ranges in source order. Every range but
/// the last holds exactly `chunk_size` indices.
pub fn plan_ranges(total: usize, chunk_size: usize) -> AggregationResult<Vec<Range<usize>>> {
    if chunk_size == 0 {
        return Err(AggregationError::invalid_config(
            "chunk_size",
            chunk_size,
            "must be a positive integer",
        ));
    }

    Ok((0..total)
        .step_by(chunk_size)
        .map(|start| start..total.min(start.saturating_add(chunk_size)))
        .collect())
}

/// Partition `records` into chunks of `chunk_size`
///
/// Chunk indices start at 0 and have no gaps; that order is the merge order.
/// Empty input yields no chunks.
pub fn partition(records: &Arc<[Record]>, chunk_size: usize) -> AggregationResult<Vec<Chunk>> {
    let chunks = plan_ranges(records.len(), chunk_size)?
        .into_iter()
        .enumerate()
        .map(|(index, range)| Chunk::new(index, range, Arc::clone(records)))
        .collect::<AggregationResult<Vec<Chunk>>>()?;

    debug!(
        "Partitioned {} records into {} chunks of up to {}",
        records.len(),
        chunks.len(),
        chunk_size
    );

    Ok(chunks)
}
