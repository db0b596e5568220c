// Task Queue - FIFO of pending task ids served by a fixed worker pool
//
// All bookkeeping (statuses, results, counters, batch membership) sits behind
// one mutex that is held only for short, non-async sections. Jobs run
// outside the lock.

mod shutdown;
mod worker;

pub use shutdown::{stop_channel, StopSender, StopToken};

use crate::application::executor::RequestExecutor;
use crate::application::jobs::{JobDescriptor, JobError, JobOutcome, JobTarget, TaskContext};
use crate::domain::{
    BatchIndex, QueueConfig, RequestLog, RequestLogRecord, TaskCounts, TaskId, TaskRecord,
    TaskSnapshot, TaskStatus,
};
use crate::error::{AppError, Result};
use crate::port::time_provider::SystemTimeProvider;
use crate::port::TimeProvider;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use worker::Worker;

/// Queue-wide statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    #[serde(flatten)]
    pub counts: TaskCounts,
    /// Ids sent to the channel and not yet taken by a worker
    pub queue_depth: usize,
}

/// A task plus the operation it runs
struct QueuedTask {
    record: TaskRecord,
    target: Arc<dyn JobTarget>,
}

#[derive(Default)]
struct QueueState {
    tasks: HashMap<TaskId, QueuedTask>,
    order: Vec<TaskId>,
    batches: BatchIndex,
    counts: TaskCounts,
    queue_depth: usize,
}

/// What a worker needs after a successful claim
pub(crate) struct ClaimedTask {
    pub target: Arc<dyn JobTarget>,
    pub context: TaskContext,
    pub throttle: Option<Duration>,
}

/// State shared by the queue handle and its workers
pub(crate) struct Shared {
    config: QueueConfig,
    executor: Arc<RequestExecutor>,
    time_provider: Arc<dyn TimeProvider>,
    state: Mutex<QueueState>,
    sender: mpsc::UnboundedSender<TaskId>,
    receiver: tokio::sync::Mutex<mpsc::UnboundedReceiver<TaskId>>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Atomically check-and-claim: Pending -> Running in one critical section
    ///
    /// Returns `None` when the id is unknown or another worker already
    /// claimed it.
    pub(crate) fn claim(&self, task_id: &str) -> Option<ClaimedTask> {
        let now = self.time_provider.now_millis();
        let mut guard = self.state();
        let state = &mut *guard;
        state.queue_depth = state.queue_depth.saturating_sub(1);

        let Some(task) = state.tasks.get_mut(task_id) else {
            warn!(task_id, "Received unknown task id, skipping");
            return None;
        };
        if task.record.status != TaskStatus::Pending {
            debug!(task_id, status = %task.record.status, "Task already claimed, skipping");
            return None;
        }
        if let Err(e) = task.record.start(now) {
            warn!(task_id, error = %e, "Failed to claim task");
            return None;
        }
        state.counts.apply(TaskStatus::Pending, TaskStatus::Running);

        let record = &task.record;
        Some(ClaimedTask {
            target: Arc::clone(&task.target),
            context: TaskContext::new(
                record.id.clone(),
                record.batch_tag.clone(),
                record.credentials.clone(),
                record.request_logs.clone(),
                Arc::clone(&self.executor),
            ),
            throttle: record.throttle,
        })
    }

    /// Write the outcome and the status transition together
    pub(crate) fn settle(&self, task_id: &str, outcome: JobOutcome) -> Option<TaskStatus> {
        let now = self.time_provider.now_millis();
        let mut guard = self.state();
        let state = &mut *guard;

        let Some(task) = state.tasks.get_mut(task_id) else {
            error!(task_id, "Settled task vanished from the queue");
            return None;
        };

        let outcome = match outcome {
            Ok(serde_json::Value::Null) => Err(JobError::NoResult),
            other => other,
        };
        let transition = match outcome {
            Ok(result) => task.record.complete(result, now),
            Err(e) => task.record.fail(e.to_string(), now),
        };
        if let Err(e) = transition {
            error!(task_id, error = %e, "Failed to settle task");
            return None;
        }

        let status = task.record.status;
        state.counts.apply(TaskStatus::Running, status);
        Some(status)
    }
}

struct WorkerPool {
    stop: StopSender,
    handles: Vec<JoinHandle<()>>,
}

/// Bounded worker-pool queue for remote-call jobs
///
/// # Example
/// ```text
/// let queue = TaskQueue::new(config, executor)?;
/// for job in jobs {
///     queue.submit(JobDescriptor::new(job, "B1"))?;
/// }
/// queue.start()?;
/// while !queue.is_done() { sleep(poll).await; }
/// queue.stop().await;
/// let results = queue.batch_results("B1");
/// ```
pub struct TaskQueue {
    shared: Arc<Shared>,
    pool: Mutex<Option<WorkerPool>>,
}

impl TaskQueue {
    /// Create a queue; workers are not started
    pub fn new(config: QueueConfig, executor: Arc<RequestExecutor>) -> Result<Self> {
        Self::with_time_provider(config, executor, Arc::new(SystemTimeProvider))
    }

    pub fn with_time_provider(
        config: QueueConfig,
        executor: Arc<RequestExecutor>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Result<Self> {
        config.validate()?;
        info!(workers = config.worker_count, "Initializing task queue");

        let (sender, receiver) = mpsc::unbounded_channel();
        Ok(Self {
            shared: Arc::new(Shared {
                config,
                executor,
                time_provider,
                state: Mutex::new(QueueState::default()),
                sender,
                receiver: tokio::sync::Mutex::new(receiver),
            }),
            pool: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &QueueConfig {
        &self.shared.config
    }

    pub fn executor(&self) -> &Arc<RequestExecutor> {
        &self.shared.executor
    }

    /// Submit a job; returns its id `{batch_tag}_{n}`
    ///
    /// Safe to call while workers are running.
    pub fn submit(&self, job: JobDescriptor) -> Result<TaskId> {
        if job.batch_tag.trim().is_empty() {
            return Err(AppError::Validation("Batch tag cannot be empty".to_string()));
        }

        let credentials = self.shared.config.credentials.clone();
        let mut guard = self.shared.state();
        let state = &mut *guard;

        let task_id = format!("{}_{}", job.batch_tag, state.order.len());
        let record = TaskRecord::new(task_id.clone(), job.batch_tag.as_str(), credentials, job.throttle);

        self.shared
            .sender
            .send(task_id.clone())
            .map_err(|_| AppError::Internal("Task channel is closed".to_string()))?;

        state.tasks.insert(
            task_id.clone(),
            QueuedTask {
                record,
                target: job.target,
            },
        );
        state.order.push(task_id.clone());
        state.batches.record(&job.batch_tag, task_id.clone());
        state.counts.add_pending();
        state.queue_depth += 1;

        debug!(
            task_id = %task_id,
            batch = %job.batch_tag,
            queue_depth = state.queue_depth,
            "Task submitted"
        );
        Ok(task_id)
    }

    /// Start the configured number of workers; no-op if already running
    pub fn start(&self) -> Result<bool> {
        self.start_workers(self.shared.config.worker_count)
    }

    /// Start exactly `worker_count` workers; returns false if already running
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start_workers(&self, worker_count: usize) -> Result<bool> {
        if worker_count == 0 {
            return Err(AppError::Validation(
                "Worker count must be at least 1".to_string(),
            ));
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| AppError::Internal(format!("No Tokio runtime: {}", e)))?;

        let mut pool = self.pool.lock().unwrap_or_else(PoisonError::into_inner);
        if pool.is_some() {
            return Ok(false);
        }

        info!(workers = worker_count, "Starting queue processing");
        let (stop, token) = stop_channel();
        let handles = (0..worker_count)
            .map(|i| {
                let worker = Worker::new(format!("worker-{}", i), Arc::clone(&self.shared));
                runtime.spawn(worker.run(token.clone()))
            })
            .collect();

        *pool = Some(WorkerPool { stop, handles });
        Ok(true)
    }

    /// Stop claiming and wait for in-flight jobs; no-op if not running
    pub async fn stop(&self) -> bool {
        let pool = self
            .pool
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(pool) = pool else {
            return false;
        };

        info!("Stopping queue processing");
        pool.stop.stop();
        for handle in pool.handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Worker terminated abnormally");
            }
        }
        info!("Queue processing stopped");
        true
    }

    pub fn is_running(&self) -> bool {
        self.pool
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Global counters and channel depth
    pub fn stats(&self) -> QueueStats {
        let state = self.shared.state();
        debug_assert!(state.counts.is_balanced());
        QueueStats {
            counts: state.counts,
            queue_depth: state.queue_depth,
        }
    }

    /// Counters of one batch; all zero if the tag is unknown
    pub fn batch_stats(&self, batch_tag: &str) -> TaskCounts {
        let state = self.shared.state();
        TaskCounts::tally(
            state
                .batches
                .task_ids(batch_tag)
                .iter()
                .filter_map(|id| state.tasks.get(id))
                .map(|task| &task.record.status),
        )
    }

    /// One slot per task in submission order; `None` until the task settles
    pub fn batch_results(&self, batch_tag: &str) -> Vec<Option<serde_json::Value>> {
        let state = self.shared.state();
        state
            .batches
            .task_ids(batch_tag)
            .iter()
            .map(|id| state.tasks.get(id).and_then(|task| task.record.result.clone()))
            .collect()
    }

    /// Every submitted task settled, across ALL batches of this queue
    pub fn is_done(&self) -> bool {
        let state = self.shared.state();
        state.counts.settled() == state.counts.total
    }

    /// Settled fraction in `[0, 1]`; 0 for an empty queue
    pub fn progress(&self) -> f64 {
        let counts = self.stats().counts;
        if counts.total == 0 {
            return 0.0;
        }
        counts.settled() as f64 / counts.total as f64
    }

    pub fn task(&self, task_id: &str) -> Option<TaskSnapshot> {
        self.shared
            .state()
            .tasks
            .get(task_id)
            .map(|task| task.record.snapshot())
    }

    pub fn batch_tasks(&self, batch_tag: &str) -> Vec<TaskSnapshot> {
        let state = self.shared.state();
        state
            .batches
            .task_ids(batch_tag)
            .iter()
            .filter_map(|id| state.tasks.get(id))
            .map(|task| task.record.snapshot())
            .collect()
    }

    /// Request records of all tasks, in task submission order
    pub fn request_logs(&self) -> Vec<RequestLogRecord> {
        let logs: Vec<RequestLog> = {
            let state = self.shared.state();
            state
                .order
                .iter()
                .filter_map(|id| state.tasks.get(id))
                .map(|task| task.record.request_logs.clone())
                .collect()
        };
        logs.iter().flat_map(RequestLog::records).collect()
    }

    /// Merge task records into `history`, skipping hashes it already holds
    pub fn sync_request_history(&self, history: &RequestLog) -> usize {
        let added = history.merge_unique(self.request_logs());
        info!(added, total = history.len(), "Synced request history");
        added
    }
}

impl Drop for TaskQueue {
    fn drop(&mut self) {
        // Workers exit on their own once the stop sender is gone
        if let Some(pool) = self.pool.get_mut().unwrap_or_else(PoisonError::into_inner).take() {
            pool.stop.stop();
        }
    }
}
