//! Chunked parallel aggregation
//!
//! A run flows one way through the pipeline:
//!
//! 1. [`partition`](partition::partition) splits the records into chunks
//! 2. [`ExecutionCoordinator`] runs one worker per chunk and waits for all of them
//! 3. [`merge`](aggregator::merge) folds the partials, in chunk order, into a
//!    [`FinalAggregate`]
//!
//! [`AggregationEngine`] wires the steps together. Nothing survives between
//! runs: every call builds its own chunks and result store.

pub mod aggregator;
pub mod coordinator;
pub mod errors;
pub mod partition;
pub mod source;
pub mod store;
pub mod types;
pub mod worker;


pub use aggregator::merge;
pub use coordinator::ExecutionCoordinator;
pub use errors::{AggregationError, AggregationResult, WorkerFailureCause};
pub use partition::partition;
pub use source::{RangeSource, RecordSource, VecSource};
pub use store::ResultStore;
pub use types::{Chunk, FinalAggregate, PartialAggregate, Record};
pub use worker::{compute_partial, AggregateWorker, PartialWorker, WorkerOptions};

use crate::config::EngineConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

/// Outcome of a successful run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub aggregate: FinalAggregate,
    pub mean: Option<f64>,
    pub record_count: usize,
    pub chunk_count: usize,
    pub chunk_size: usize,
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
}

/// Partition, reduce and merge with one configuration
#[derive(Debug, Clone)]
pub struct AggregationEngine {
    config: EngineConfig,
    coordinator: ExecutionCoordinator,
}

impl AggregationEngine {
    /// Create an engine using the standard worker
    pub fn new(config: EngineConfig) -> AggregationResult<Self> {
        config.validate()?;
        let coordinator = ExecutionCoordinator::from_config(&config);
        Ok(Self {
            config,
            coordinator,
        })
    }

    /// Create an engine that runs a custom worker per chunk
    pub fn with_worker(
        config: EngineConfig,
        worker: Arc<dyn PartialWorker>,
    ) -> AggregationResult<Self> {
        config.validate()?;
        let coordinator = ExecutionCoordinator::new(worker)
            .with_parallelism(config.parallelism)
            .with_timeout(config.timeout);
        Ok(Self {
            config,
            coordinator,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Aggregate `records`, returning only the final aggregate
    pub async fn aggregate(&self, records: Arc<[Record]>) -> AggregationResult<FinalAggregate> {
        let chunks = partition(&records, self.config.chunk_size)?;
        let chunk_count = chunks.len();
        let store = self.coordinator.execute(chunks).await?;
        merge(&store, chunk_count)
    }

    /// Pull records from `source` and aggregate them
    pub async fn run<S>(&self, source: &S) -> AggregationResult<AggregationReport>
    where
        S: RecordSource + ?Sized,
    {
        let records = source.records()?;
        let run_id = Uuid::new_v4();
        let span = info_span!(
            "aggregation_run",
            %run_id,
            records = records.len(),
            chunk_size = self.config.chunk_size
        );

        async move {
            let started_at = Utc::now();
            let clock = Instant::now();
            let record_count = records.len();
            let chunk_count = record_count.div_ceil(self.config.chunk_size);

            let aggregate = self.aggregate(records).await?;
            let elapsed = clock.elapsed();

            info!(
                "Aggregated {} records in {} chunks: sum={} even={} odd={}",
                record_count, chunk_count, aggregate.sum, aggregate.even_count, aggregate.odd_count
            );

            Ok(AggregationReport {
                run_id,
                started_at,
                mean: aggregate.mean(),
                aggregate,
                record_count,
                chunk_count,
                chunk_size: self.config.chunk_size,
                elapsed,
            })
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{NumberDomain, Parallelism};

    #[tokio::test]
    async fn test_reference_scenario() {
        let engine = AggregationEngine::new(EngineConfig::new(3)).unwrap();
        let source = VecSource::from_numbers([4, 7, 2, 9, 1, 6, 3, 8, 5, 10]);

        let report = engine.run(&source).await.unwrap();
        assert_eq!(report.chunk_count, 4);
        assert_eq!(report.record_count, 10);
        assert_eq!(
            report.aggregate,
            FinalAggregate {
                sum: 55,
                max: Some(10),
                min: Some(1),
                even_count: 5,
                odd_count: 5,
            }
        );
        assert_eq!(report.mean, Some(5.5));
    }

    #[tokio::test]
    async fn test_empty_input_scenario() {
        let engine = AggregationEngine::new(EngineConfig::new(4)).unwrap();
        let report = engine.run(&VecSource::from_numbers([])).await.unwrap();
        assert_eq!(report.chunk_count, 0);
        assert_eq!(report.aggregate, FinalAggregate::empty());
        assert_eq!(report.mean, None);
    }

    #[test]
    fn test_invalid_config_is_rejected_up_front() {
        let err = AggregationEngine::new(EngineConfig::new(0)).unwrap_err();
        assert!(err.is_configuration_error());
    }

    #[tokio::test]
    async fn test_bounded_pool_matches_per_chunk() {
        let records = RangeSource::new(-50, 1_000).records().unwrap();
        let per_chunk = AggregationEngine::new(EngineConfig::new(37)).unwrap();
        let bounded =
            AggregationEngine::new(EngineConfig::new(37).with_parallelism(Parallelism::Bounded(3)))
                .unwrap();

        let a = per_chunk.aggregate(records.clone()).await.unwrap();
        let b = bounded.aggregate(records.clone()).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a, FinalAggregate::from_records(&records).unwrap());
    }

    #[tokio::test]
    async fn test_failed_run_exposes_no_aggregate() {
        let config = EngineConfig::new(2).with_number_domain(NumberDomain::new(1, 100));
        let engine = AggregationEngine::new(config).unwrap();
        let source = VecSource::from_numbers([1, 2, 3, 400, 5]);

        let err = engine.run(&source).await.unwrap_err();
        assert_eq!(err.chunk_index(), Some(1));
    }

    #[tokio::test]
    async fn test_report_serializes_elapsed_as_humantime() {
        let engine = AggregationEngine::new(EngineConfig::new(2)).unwrap();
        let report = engine.run(&RangeSource::new(1, 4)).await.unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert!(json["elapsed"].is_string());
        assert_eq!(json["aggregate"]["sum"], 10);
    }
}
