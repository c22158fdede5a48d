//! Write-once result slots indexed by chunk
//!
//! The store is sized for the run up front. Each slot accepts exactly one
//! partial aggregate; a second write to the same chunk is an error rather
//! than an overwrite.

use super::errors::{AggregationError, AggregationResult};
use super::types::PartialAggregate;

/// Pre-allocated slot array holding one partial per chunk index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultStore {
    slots: Vec<Option<PartialAggregate>>,
}

impl ResultStore {
    /// Create a store with one empty slot per chunk
    pub fn with_capacity(chunk_count: usize) -> Self {
        Self {
            slots: vec![None; chunk_count],
        }
    }

    /// Number of slots (the run's chunk count)
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of slots that have been written
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write the partial for `chunk_index`
    pub fn record(&mut self, chunk_index: usize, partial: PartialAggregate) -> AggregationResult<()> {
        let chunk_count = self.slots.len();
        let slot = self
            .slots
            .get_mut(chunk_index)
            .ok_or(AggregationError::UnknownChunk {
                chunk_index,
                chunk_count,
            })?;

        if slot.is_some() {
            return Err(AggregationError::DuplicateResult { chunk_index });
        }
        *slot = Some(partial);
        Ok(())
    }

    pub fn get(&self, chunk_index: usize) -> Option<&PartialAggregate> {
        self.slots.get(chunk_index).and_then(Option::as_ref)
    }

    /// Chunk indices that have not reported yet
    pub fn missing(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_none())
            .map(|(index, _)| index)
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    /// Partials in chunk-index order, skipping empty slots
    pub fn iter(&self) -> impl Iterator<Item = (usize, &PartialAggregate)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|partial| (index, partial)))
    }
}
