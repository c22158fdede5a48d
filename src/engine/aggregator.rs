//! Merging partial aggregates into the final result

use super::errors::{AggregationError, AggregationResult, WorkerFailureCause};
use super::store::ResultStore;
use super::types::FinalAggregate;
use tracing::debug;

/// Merge every partial in `store`, in chunk-index order
///
/// The store must hold exactly one partial for each index in
/// `[0, chunk_count)`; anything else is `IncompleteResults`. A run with no
/// chunks merges to [`FinalAggregate::empty`].
pub fn merge(store: &ResultStore, chunk_count: usize) -> AggregationResult<FinalAggregate> {
    let missing: Vec<usize> = (0..chunk_count)
        .filter(|&index| store.get(index).is_none())
        .collect();

    if !missing.is_empty() || store.capacity() != chunk_count {
        return Err(AggregationError::IncompleteResults {
            expected: chunk_count,
            missing,
        });
    }

    let mut total = FinalAggregate::empty();
    for (index, partial) in store.iter() {
        total.absorb(partial).map_err(|overflow| {
            AggregationError::worker_failure(
                index,
                WorkerFailureCause::Overflow {
                    field: overflow.field.to_string(),
                },
            )
        })?;
    }

    debug!(
        "Merged {} partial aggregates covering {} records",
        chunk_count,
        total.len()
    );
    Ok(total)
}
