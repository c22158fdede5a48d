//! Record sources
//!
//! The engine only needs a fully materialised, ordered record sequence.
//! Loading and generating data is the caller's job; these sources cover the
//! in-memory and arithmetic-range cases.

use super::errors::{AggregationError, AggregationResult};
use super::types::Record;
use std::sync::Arc;

/// Supplies the ordered records for one run
pub trait RecordSource: Send + Sync {
    fn records(&self) -> AggregationResult<Arc<[Record]>>;
}

/// Records already held in memory
#[derive(Debug, Clone)]
pub struct VecSource {
    records: Arc<[Record]>,
}

impl VecSource {
    pub fn new(records: impl Into<Arc<[Record]>>) -> Self {
        Self {
            records: records.into(),
        }
    }

    /// Number values with IDs assigned 1, 2, 3, ... in order
    pub fn from_numbers(numbers: impl IntoIterator<Item = i64>) -> Self {
        let records: Vec<Record> = numbers
            .into_iter()
            .zip(1i64..)
            .map(|(number, id)| Record::new(id, number))
            .collect();
        Self::new(records)
    }
}

impl RecordSource for VecSource {
    fn records(&self) -> AggregationResult<Arc<[Record]>> {
        Ok(Arc::clone(&self.records))
    }
}

/// The numbers `start..=end`, with IDs counting from 1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeSource {
    pub start: i64,
    pub end: i64,
}

impl RangeSource {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        if self.end < self.start {
            0
        } else {
            (self.end as i128 - self.start as i128 + 1) as usize
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RecordSource for RangeSource {
    fn records(&self) -> AggregationResult<Arc<[Record]>> {
        if self.end < self.start {
            return Ok(Arc::from(Vec::new()));
        }
        if self.end == i64::MAX {
            return Err(AggregationError::invalid_config(
                "end",
                self.end,
                "range end must be below i64::MAX",
            ));
        }

        Ok((self.start..=self.end)
            .zip(1i64..)
            .map(|(number, id)| Record::new(id, number))
            .collect::<Vec<_>>()
            .into())
    }
}
