// Worker - claim and execute loop

use super::shutdown::StopToken;
use super::Shared;
use crate::application::constants::RECEIVE_POLL_INTERVAL;
use crate::application::jobs::{JobError, JobOutcome};
use crate::domain::{TaskId, TaskStatus};
use std::any::Any;
use std::sync::Arc;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

enum Received {
    Task(TaskId),
    Idle,
    Closed,
}

/// One loop of the pool
pub(crate) struct Worker {
    name: String,
    shared: Arc<Shared>,
}

impl Worker {
    pub(crate) fn new(name: impl Into<String>, shared: Arc<Shared>) -> Self {
        Self {
            name: name.into(),
            shared,
        }
    }

    /// Run until stopped
    ///
    /// A stop request interrupts waiting for the next id but never a job that
    /// is already running.
    pub(crate) async fn run(self, mut stop: StopToken) {
        info!(worker = %self.name, "Worker started");
        loop {
            if stop.is_stopped() {
                break;
            }

            let received = tokio::select! {
                biased;
                _ = stop.stopped() => break,
                received = self.receive() => received,
            };

            match received {
                Received::Task(task_id) => self.process(task_id).await,
                Received::Idle => continue,
                Received::Closed => {
                    warn!(worker = %self.name, "Task channel closed");
                    break;
                }
            }
        }
        info!(worker = %self.name, "Worker stopped");
    }

    /// Wait at most one poll interval for the next id
    async fn receive(&self) -> Received {
        let mut receiver = self.shared.receiver.lock().await;
        match timeout(RECEIVE_POLL_INTERVAL, receiver.recv()).await {
            Ok(Some(task_id)) => Received::Task(task_id),
            Ok(None) => Received::Closed,
            Err(_) => Received::Idle,
        }
    }

    /// Claim, execute, settle, then throttle
    async fn process(&self, task_id: TaskId) {
        let Some(claimed) = self.shared.claim(&task_id) else {
            return;
        };

        info!(
            worker = %self.name,
            task_id = %task_id,
            batch = %claimed.context.batch_tag,
            job = claimed.target.name(),
            "Processing task"
        );

        // Spawned so a panicking job fails its task instead of the worker
        let target = Arc::clone(&claimed.target);
        let context = claimed.context;
        let handle = tokio::spawn(async move { target.run(context).await });

        let outcome: JobOutcome = match handle.await {
            Ok(outcome) => outcome,
            Err(join_err) if join_err.is_panic() => {
                Err(JobError::Panicked(panic_message(join_err.into_panic())))
            }
            Err(join_err) => Err(JobError::Failed(format!("Job cancelled: {}", join_err))),
        };

        let error = outcome.as_ref().err().map(ToString::to_string);
        match self.shared.settle(&task_id, outcome) {
            Some(TaskStatus::Completed) => {
                info!(worker = %self.name, task_id = %task_id, "Task completed");
            }
            Some(_) => {
                warn!(
                    worker = %self.name,
                    task_id = %task_id,
                    error = error.as_deref().unwrap_or("no result"),
                    "Task failed"
                );
            }
            None => {
                error!(worker = %self.name, task_id = %task_id, "Task outcome was not recorded");
            }
        }

        if let Some(throttle) = claimed.throttle.filter(|t| !t.is_zero()) {
            debug!(
                worker = %self.name,
                throttle_ms = throttle.as_millis() as u64,
                "Throttling worker"
            );
            sleep(throttle).await;
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
