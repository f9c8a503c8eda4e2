//! Job queue: bounded workers, generation-based coalescing, delivery
//!
//! The queue owns a semaphore-bounded pool of blocking workers and a
//! monotonically increasing generation floor. `flush(n)` raises the floor so
//! every queued or running job with a smaller index cancels at its next
//! checkpoint; newer jobs are unaffected. Each non-cancelled job delivers
//! exactly one terminal outcome to its observer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::Semaphore;

use crate::graph::job::{JobOutcome, RenderJob, RenderRequest};
use crate::store::Database;

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct JobQueueConfig {
    /// Maximum renders executing concurrently.
    pub workers: usize,
}

impl Default for JobQueueConfig {
    fn default() -> Self {
        Self { workers: 2 }
    }
}

/// Counters the queue keeps as jobs move through it.
#[derive(Debug, Default, Clone)]
pub struct QueueStats {
    /// Jobs admitted.
    pub enqueued: u64,
    /// Jobs that delivered an image.
    pub completed: u64,
    /// Jobs cancelled or superseded before delivery.
    pub cancelled: u64,
    /// Jobs that delivered an error.
    pub failed: u64,
}

/// Receives each job's terminal outcome. Implementations decide their own
/// thread-affinity; the queue only produces the result.
pub trait RenderObserver: Send + Sync {
    /// Called exactly once per non-cancelled, non-superseded job.
    fn render_complete(&self, index: u64, outcome: JobOutcome);
}

/// Owns the worker pool and the coalescing generation floor.
pub struct JobQueue {
    config: JobQueueConfig,
    floor: AtomicU64,
    next_index: AtomicU64,
    semaphore: Arc<Semaphore>,
    stats: RwLock<QueueStats>,
}

impl JobQueue {
    /// Create a queue with `config`.
    pub fn new(config: JobQueueConfig) -> Arc<Self> {
        let workers = config.workers.max(1);
        Arc::new(Self {
            config: JobQueueConfig { workers },
            floor: AtomicU64::new(0),
            next_index: AtomicU64::new(0),
            semaphore: Arc::new(Semaphore::new(workers)),
            stats: RwLock::new(QueueStats::default()),
        })
    }

    /// Create a queue with the default configuration.
    pub fn with_defaults() -> Arc<Self> {
        Self::new(JobQueueConfig::default())
    }

    /// Active configuration.
    pub fn config(&self) -> &JobQueueConfig {
        &self.config
    }

    /// Snapshot of the queue counters.
    pub fn stats(&self) -> QueueStats {
        self.stats.read().clone()
    }

    /// Hand out the next coalescing index. Callers may also number requests
    /// themselves; only relative order matters.
    pub fn next_index(&self) -> u64 {
        self.next_index.fetch_add(1, Ordering::AcqRel)
    }

    /// Cancel every queued or running job whose index is below `max_index`.
    ///
    /// The floor only ever rises. A job that already passed its last
    /// checkpoint may still deliver; tightening that window means adding
    /// checkpoints, not changing the flush.
    pub fn flush(&self, max_index: u64) {
        let prev = self.floor.fetch_max(max_index, Ordering::AcqRel);
        if max_index > prev {
            tracing::debug!(floor = max_index, "flushed stale render jobs");
        }
    }

    /// Admit a job. Must be called from within a tokio runtime; the render
    /// itself runs on a blocking worker so it never stalls the async
    /// executor.
    pub fn enqueue(
        self: &Arc<Self>,
        db: Arc<Database>,
        request: RenderRequest,
        observer: Arc<dyn RenderObserver>,
    ) -> Arc<RenderJob> {
        let index = request.index;
        let job = Arc::new(RenderJob::new(db, request));
        self.stats.write().enqueued += 1;

        let queue = Arc::clone(self);
        let worker_job = Arc::clone(&job);
        tokio::spawn(async move {
            let permit = match queue.semaphore.clone().acquire_owned().await {
                Ok(p) => p,
                Err(_) => return,
            };

            let run_queue = Arc::clone(&queue);
            let run_job = Arc::clone(&worker_job);
            let result =
                tokio::task::spawn_blocking(move || run_job.run(&run_queue.floor)).await;
            drop(permit);

            match result {
                Ok(Some(outcome)) => {
                    {
                        let mut stats = queue.stats.write();
                        match outcome {
                            JobOutcome::Completed(_) => stats.completed += 1,
                            JobOutcome::Failed(_) => stats.failed += 1,
                        }
                    }
                    if let JobOutcome::Failed(e) = &outcome {
                        tracing::warn!(index, error = %e, "render job failed");
                    }
                    observer.render_complete(index, outcome);
                }
                Ok(None) => {
                    queue.stats.write().cancelled += 1;
                }
                Err(e) => {
                    tracing::error!(index, error = %e, "render worker panicked");
                    queue.stats.write().failed += 1;
                }
            }
        });

        job
    }
}
