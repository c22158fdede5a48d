//! Core data types for the aggregation pipeline

use super::errors::{AggregationError, AggregationResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;
use std::sync::Arc;
use thiserror::Error;

/// One input row: a unique, increasing ID and the value being aggregated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Record {
    pub id: i64,
    pub number: i64,
}

impl Record {
    pub fn new(id: i64, number: i64) -> Self {
        Self { id, number }
    }

    /// Parity is `number mod 2 == 0`, which also holds for negative numbers
    pub fn is_even(&self) -> bool {
        self.number % 2 == 0
    }
}

/// A contiguous `[start, end)` slice of the shared record sequence
///
/// Chunks share the backing records through an `Arc`, so handing one to a
/// worker thread copies no data.
#[derive(Clone)]
pub struct Chunk {
    index: usize,
    range: Range<usize>,
    records: Arc<[Record]>,
}

impl Chunk {
    /// Create a chunk over `records[range]`
    ///
    /// Fails with `InvalidConfiguration` when the range is inverted or runs
    /// past the end of `records`.
    pub fn new(
        index: usize,
        range: Range<usize>,
        records: Arc<[Record]>,
    ) -> AggregationResult<Self> {
        if range.start > range.end || range.end > records.len() {
            return Err(AggregationError::invalid_config(
                "range",
                format!("{}..{}", range.start, range.end),
                format!("chunk {index} must lie within 0..{}", records.len()),
            ));
        }

        Ok(Self {
            index,
            range,
            records,
        })
    }

    /// Zero-based position of this chunk in merge order
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn start(&self) -> usize {
        self.range.start
    }

    pub fn end(&self) -> usize {
        self.range.end
    }

    pub fn range(&self) -> Range<usize> {
        self.range.clone()
    }

    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    /// The records covered by this chunk
    pub fn records(&self) -> &[Record] {
        &self.records[self.range.clone()]
    }

    /// The record just before this chunk in the shared sequence, if any
    pub fn preceding(&self) -> Option<&Record> {
        self.range
            .start
            .checked_sub(1)
            .and_then(|i| self.records.get(i))
    }
}

impl fmt::Debug for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chunk")
            .field("index", &self.index)
            .field("start", &self.range.start)
            .field("end", &self.range.end)
            .finish()
    }
}

impl PartialEq for Chunk {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
            && self.range == other.range
            && Arc::ptr_eq(&self.records, &other.records)
    }
}

/// Checked arithmetic on an aggregate field overflowed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("aggregate field '{field}' overflowed")]
pub struct AggregateOverflow {
    pub field: &'static str,
}

fn checked_add(a: i64, b: i64, field: &'static str) -> Result<i64, AggregateOverflow> {
    a.checked_add(b).ok_or(AggregateOverflow { field })
}

/// Summary of one non-empty chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialAggregate {
    pub sum: i64,
    pub max: i64,
    pub min: i64,
    pub even_count: i64,
    pub odd_count: i64,
}

impl PartialAggregate {
    /// Aggregate of a single record
    pub fn of(record: &Record) -> Self {
        let even = record.is_even();
        Self {
            sum: record.number,
            max: record.number,
            min: record.number,
            even_count: i64::from(even),
            odd_count: i64::from(!even),
        }
    }

    /// Fold one more record into this aggregate
    pub fn push(&mut self, record: &Record) -> Result<(), AggregateOverflow> {
        self.sum = checked_add(self.sum, record.number, "sum")?;
        self.max = self.max.max(record.number);
        self.min = self.min.min(record.number);
        if record.is_even() {
            self.even_count = checked_add(self.even_count, 1, "even_count")?;
        } else {
            self.odd_count = checked_add(self.odd_count, 1, "odd_count")?;
        }
        Ok(())
    }

    /// Combine two partials
    ///
    /// Addition for sum and counts, pairwise max/min for the extremes. The
    /// operation is associative and commutative, so merge order never changes
    /// the result.
    pub fn combine(self, other: Self) -> Result<Self, AggregateOverflow> {
        Ok(Self {
            sum: checked_add(self.sum, other.sum, "sum")?,
            max: self.max.max(other.max),
            min: self.min.min(other.min),
            even_count: checked_add(self.even_count, other.even_count, "even_count")?,
            odd_count: checked_add(self.odd_count, other.odd_count, "odd_count")?,
        })
    }

    /// Number of records summarised
    pub fn len(&self) -> i64 {
        self.even_count + self.odd_count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Aggregate over a whole input
///
/// `max` and `min` are `None` exactly when the input was empty; zero is never
/// used as a stand-in for "no value".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FinalAggregate {
    pub sum: i64,
    pub max: Option<i64>,
    pub min: Option<i64>,
    pub even_count: i64,
    pub odd_count: i64,
}

impl FinalAggregate {
    /// Aggregate of an empty input
    pub fn empty() -> Self {
        Self::default()
    }

    /// Merge a partial into the running total
    pub fn absorb(&mut self, partial: &PartialAggregate) -> Result<(), AggregateOverflow> {
        self.sum = checked_add(self.sum, partial.sum, "sum")?;
        self.even_count = checked_add(self.even_count, partial.even_count, "even_count")?;
        self.odd_count = checked_add(self.odd_count, partial.odd_count, "odd_count")?;
        self.max = Some(self.max.map_or(partial.max, |m| m.max(partial.max)));
        self.min = Some(self.min.map_or(partial.min, |m| m.min(partial.min)));
        Ok(())
    }

    /// Single-pass sequential aggregate, used as the reference result
    pub fn from_records(records: &[Record]) -> Result<Self, AggregateOverflow> {
        let mut records = records.iter();
        let Some(first) = records.next() else {
            return Ok(Self::empty());
        };

        let mut acc = PartialAggregate::of(first);
        for record in records {
            acc.push(record)?;
        }
        Ok(acc.into())
    }

    /// Total number of records aggregated
    pub fn len(&self) -> i64 {
        self.even_count + self.odd_count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Arithmetic mean, absent for empty input
    pub fn mean(&self) -> Option<f64> {
        if self.is_empty() {
            None
        } else {
            Some(self.sum as f64 / self.len() as f64)
        }
    }
}

impl From<PartialAggregate> for FinalAggregate {
    fn from(partial: PartialAggregate) -> Self {
        Self {
            sum: partial.sum,
            max: Some(partial.max),
            min: Some(partial.min),
            even_count: partial.even_count,
            odd_count: partial.odd_count,
        }
    }
}
