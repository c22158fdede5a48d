//! Fan-out / join coordination for chunk workers
//!
//! Every chunk gets its own blocking task. A semaphore caps how many run at
//! once when a bounded pool is configured; by default the cap equals the
//! chunk count so all workers start together. The coordinator is the only
//! writer of the result store, and it hands the store back only after every
//! worker has reported. The first failure ends the run.

use super::errors::{AggregationError, AggregationResult, WorkerFailureCause};
use super::store::ResultStore;
use super::types::{Chunk, PartialAggregate};
use super::worker::{AggregateWorker, PartialWorker, WorkerOptions};
use crate::config::{EngineConfig, Parallelism};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinError, JoinSet};
use tracing::{debug, error, info, trace, warn};

type WorkerOutcome = AggregationResult<(usize, PartialAggregate)>;

/// Runs one worker per chunk and gathers their partials
#[derive(Clone)]
pub struct ExecutionCoordinator {
    worker: Arc<dyn PartialWorker>,
    parallelism: Parallelism,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for ExecutionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionCoordinator")
            .field("parallelism", &self.parallelism)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl ExecutionCoordinator {
    /// Create a coordinator that runs `worker` once per chunk
    pub fn new(worker: Arc<dyn PartialWorker>) -> Self {
        Self {
            worker,
            parallelism: Parallelism::PerChunk,
            timeout: None,
        }
    }

    /// Coordinator using the standard worker and the config's limits
    pub fn from_config(config: &EngineConfig) -> Self {
        let worker = AggregateWorker::new(WorkerOptions::from(config));
        Self::new(Arc::new(worker))
            .with_parallelism(config.parallelism)
            .with_timeout(config.timeout)
    }

    pub fn with_parallelism(mut self, parallelism: Parallelism) -> Self {
        self.parallelism = parallelism;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn parallelism(&self) -> Parallelism {
        self.parallelism
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Run every chunk and return the filled result store
    ///
    /// Returns only after all workers have reported, the first worker has
    /// failed, or the timeout has elapsed. On failure no partial results
    /// escape; outstanding tasks are aborted and their output discarded.
    pub async fn execute(&self, chunks: Vec<Chunk>) -> AggregationResult<ResultStore> {
        let chunk_count = chunks.len();
        let mut store = ResultStore::with_capacity(chunk_count);

        if chunk_count == 0 {
            debug!("No chunks to execute");
            return Ok(store);
        }

        let max_workers = self.parallelism.max_workers(chunk_count);
        if max_workers == 0 {
            return Err(AggregationError::invalid_config(
                "parallelism",
                "bounded(0)",
                "worker pool needs at least one worker",
            ));
        }

        info!(
            "Executing {} chunks with up to {} concurrent workers",
            chunk_count, max_workers
        );

        let started = Instant::now();
        let semaphore = Arc::new(Semaphore::new(max_workers));
        let mut tasks = JoinSet::new();
        let mut owners = HashMap::with_capacity(chunk_count);

        for chunk in chunks {
            let index = chunk.index();
            let worker = Arc::clone(&self.worker);
            let semaphore = Arc::clone(&semaphore);
            let handle = tasks.spawn(run_worker(worker, semaphore, chunk));
            owners.insert(handle.id(), index);
        }

        let joined = match self.timeout {
            Some(limit) => {
                let bounded =
                    tokio::time::timeout(limit, collect(&mut tasks, &owners, &mut store)).await;
                match bounded {
                    Ok(result) => result,
                    Err(_) => {
                        let pending = store.missing();
                        warn!(
                            "Join barrier timed out after {:?} with {} chunks outstanding",
                            limit,
                            pending.len()
                        );
                        Err(AggregationError::worker_failure(
                            pending.first().copied().unwrap_or_default(),
                            WorkerFailureCause::TimedOut {
                                after: limit,
                                outstanding: pending,
                            },
                        ))
                    }
                }
            }
            None => collect(&mut tasks, &owners, &mut store).await,
        };

        if let Err(e) = joined {
            tasks.abort_all();
            error!("Aggregation run failed: {}", e);
            return Err(e);
        }

        if !store.is_complete() {
            return Err(AggregationError::IncompleteResults {
                expected: chunk_count,
                missing: store.missing(),
            });
        }

        debug!(
            "All {} workers reported in {:?}",
            chunk_count,
            started.elapsed()
        );
        Ok(store)
    }
}

/// Wait for a worker slot, then compute the chunk on a blocking thread
async fn run_worker(
    worker: Arc<dyn PartialWorker>,
    semaphore: Arc<Semaphore>,
    chunk: Chunk,
) -> WorkerOutcome {
    let index = chunk.index();
    let _permit = semaphore
        .acquire_owned()
        .await
        .map_err(|_| AggregationError::worker_failure(index, WorkerFailureCause::Cancelled))?;

    let computed = tokio::task::spawn_blocking(move || worker.compute(&chunk)).await;

    match computed {
        Ok(Ok(partial)) => Ok((index, partial)),
        Ok(Err(AggregationError::EmptyChunk { chunk_index })) => Err(
            AggregationError::worker_failure(chunk_index, WorkerFailureCause::EmptyChunk),
        ),
        Ok(Err(e)) => Err(e),
        Err(join_error) => Err(AggregationError::worker_failure(
            index,
            failure_cause(join_error),
        )),
    }
}

/// Drain the join set into the store, stopping at the first failure
///
/// `owners` maps each task to the chunk it computes, so a task that dies
/// outside its worker is still reported against its own chunk.
async fn collect(
    tasks: &mut JoinSet<WorkerOutcome>,
    owners: &HashMap<Id, usize>,
    store: &mut ResultStore,
) -> AggregationResult<()> {
    while let Some(joined) = tasks.join_next_with_id().await {
        let (index, partial) = match joined {
            Ok((_, outcome)) => outcome?,
            Err(join_error) => {
                let index = owners
                    .get(&join_error.id())
                    .copied()
                    .or_else(|| store.missing().first().copied())
                    .unwrap_or_default();
                return Err(AggregationError::worker_failure(
                    index,
                    failure_cause(join_error),
                ));
            }
        };

        store.record(index, partial)?;
        trace!("Chunk {} reported ({} of {})", index, store.len(), store.capacity());
    }
    Ok(())
}

fn failure_cause(join_error: JoinError) -> WorkerFailureCause {
    if join_error.is_panic() {
        WorkerFailureCause::Panicked {
            message: panic_message(join_error.into_panic()),
        }
    } else {
        WorkerFailureCause::Cancelled
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::partition::partition;
    use crate::engine::types::Record;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn numbers(values: &[i64]) -> Arc<[Record]> {
        values
            .iter()
            .enumerate()
            .map(|(i, &n)| Record::new(i as i64 + 1, n))
            .collect::<Vec<_>>()
            .into()
    }

    /// Tracks how many workers run at the same time
    struct CountingWorker {
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl PartialWorker for CountingWorker {
        fn compute(&self, chunk: &Chunk) -> AggregationResult<PartialAggregate> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
            self.active.fetch_sub(1, Ordering::SeqCst);
            crate::engine::worker::compute_partial(chunk, &WorkerOptions::default())
        }
    }

    struct PanickingWorker {
        on_chunk: usize,
    }

    impl PartialWorker for PanickingWorker {
        fn compute(&self, chunk: &Chunk) -> AggregationResult<PartialAggregate> {
            if chunk.index() == self.on_chunk {
                panic!("boom in chunk {}", chunk.index());
            }
            crate::engine::worker::compute_partial(chunk, &WorkerOptions::default())
        }
    }

    struct SlowWorker;

    impl PartialWorker for SlowWorker {
        fn compute(&self, chunk: &Chunk) -> AggregationResult<PartialAggregate> {
            std::thread::sleep(Duration::from_millis(300));
            crate::engine::worker::compute_partial(chunk, &WorkerOptions::default())
        }
    }

    #[tokio::test]
    async fn test_execute_fills_every_slot() {
        let data = numbers(&[4, 7, 2, 9, 1, 6, 3, 8, 5, 10]);
        let chunks = partition(&data, 3).unwrap();
        let coordinator = ExecutionCoordinator::from_config(&EngineConfig::new(3));

        let store = coordinator.execute(chunks).await.unwrap();
        assert!(store.is_complete());
        assert_eq!(store.capacity(), 4);
        assert_eq!(store.get(0).unwrap().sum, 13);
        assert_eq!(store.get(3).unwrap().sum, 10);
    }

    #[tokio::test]
    async fn test_execute_without_chunks() {
        let coordinator = ExecutionCoordinator::from_config(&EngineConfig::default());
        let store = coordinator.execute(Vec::new()).await.unwrap();
        assert_eq!(store.capacity(), 0);
        assert!(store.is_complete());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_bounded_pool_caps_concurrency() {
        let data = numbers(&(1..=40).collect::<Vec<_>>());
        let chunks = partition(&data, 4).unwrap();
        let worker = Arc::new(CountingWorker {
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let coordinator = ExecutionCoordinator::new(worker.clone())
            .with_parallelism(Parallelism::Bounded(2));

        let store = coordinator.execute(chunks).await.unwrap();
        assert!(store.is_complete());
        assert!(worker.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_worker_failure_reports_chunk_index() {
        let data = numbers(&[1, 2, 3, 4, 0, 6]);
        let chunks = partition(&data, 2).unwrap();
        let config =
            EngineConfig::new(2).with_number_domain(crate::config::NumberDomain::new(1, 10));

        let err = ExecutionCoordinator::from_config(&config)
            .execute(chunks)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AggregationError::WorkerFailure {
                chunk_index: 2,
                cause: WorkerFailureCause::InvalidRecord { id: 5, .. }
            }
        ));
    }

    #[tokio::test]
    async fn test_panicking_worker_is_isolated() {
        let data = numbers(&[1, 2, 3, 4, 5, 6]);
        let chunks = partition(&data, 2).unwrap();
        let coordinator = ExecutionCoordinator::new(Arc::new(PanickingWorker { on_chunk: 1 }));

        let err = coordinator.execute(chunks).await.unwrap_err();
        match err {
            AggregationError::WorkerFailure {
                chunk_index,
                cause: WorkerFailureCause::Panicked { message },
            } => {
                assert_eq!(chunk_index, 1);
                assert!(message.contains("boom in chunk 1"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_join_barrier_timeout() {
        let data = numbers(&[1, 2, 3]);
        let chunks = partition(&data, 1).unwrap();
        let coordinator = ExecutionCoordinator::new(Arc::new(SlowWorker))
            .with_timeout(Some(Duration::from_millis(20)));

        let err = coordinator.execute(chunks).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(matches!(
            err,
            AggregationError::WorkerFailure {
                chunk_index: 0,
                cause: WorkerFailureCause::TimedOut { .. }
            }
        ));
    }

    #[tokio::test]
    async fn test_timeout_lists_queued_chunks() {
        let data = numbers(&[1, 2, 3]);
        let chunks = partition(&data, 1).unwrap();
        let coordinator = ExecutionCoordinator::new(Arc::new(SlowWorker))
            .with_parallelism(Parallelism::Bounded(1))
            .with_timeout(Some(Duration::from_millis(20)));

        let err = coordinator.execute(chunks).await.unwrap_err();
        match err {
            AggregationError::WorkerFailure {
                chunk_index,
                cause: WorkerFailureCause::TimedOut { outstanding, .. },
            } => {
                assert_eq!(chunk_index, 0);
                assert_eq!(outstanding, vec![0, 1, 2]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_task_failure_is_reported_against_its_own_chunk() {
        let data = numbers(&[1, 2]);
        let mut tasks: JoinSet<WorkerOutcome> = JoinSet::new();
        let mut owners = HashMap::new();

        let settled = PartialAggregate::of(&data[0]);
        let handle = tasks.spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok((0, settled))
        });
        owners.insert(handle.id(), 0);

        let dies = true;
        let partial = PartialAggregate::of(&data[1]);
        let handle = tasks.spawn(async move {
            if dies {
                panic!("task for chunk 1 died");
            }
            Ok((1, partial))
        });
        owners.insert(handle.id(), 1);

        let mut store = ResultStore::with_capacity(2);
        let err = collect(&mut tasks, &owners, &mut store).await.unwrap_err();
        tasks.abort_all();

        // Chunk 0 is still outstanding, but the failure belongs to chunk 1
        match err {
            AggregationError::WorkerFailure {
                chunk_index,
                cause: WorkerFailureCause::Panicked { message },
            } => {
                assert_eq!(chunk_index, 1);
                assert!(message.contains("chunk 1 died"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_chunk_becomes_worker_failure() {
        let data = numbers(&[1, 2]);
        let chunks = vec![
            Chunk::new(0, 0..2, data.clone()).unwrap(),
            Chunk::new(1, 2..2, data).unwrap(),
        ];
        let err = ExecutionCoordinator::from_config(&EngineConfig::default())
            .execute(chunks)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AggregationError::WorkerFailure {
                chunk_index: 1,
                cause: WorkerFailureCause::EmptyChunk
            }
        ));
    }

    #[tokio::test]
    async fn test_duplicate_chunk_index_is_rejected() {
        let data = numbers(&[1, 2]);
        let chunks = vec![
            Chunk::new(0, 0..1, data.clone()).unwrap(),
            Chunk::new(0, 1..2, data).unwrap(),
        ];
        let err = ExecutionCoordinator::from_config(&EngineConfig::default())
            .execute(chunks)
            .await
            .unwrap_err();
        assert!(matches!(err, AggregationError::DuplicateResult { chunk_index: 0 }));
    }

    #[tokio::test]
    async fn test_chunk_index_beyond_run_is_rejected() {
        let data = numbers(&[1, 2]);
        let chunks = vec![
            Chunk::new(0, 0..1, data.clone()).unwrap(),
            Chunk::new(7, 1..2, data).unwrap(),
        ];
        let err = ExecutionCoordinator::from_config(&EngineConfig::default())
            .execute(chunks)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AggregationError::UnknownChunk {
                chunk_index: 7,
                chunk_count: 2
            }
        ));
    }
}
