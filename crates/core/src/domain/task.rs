// Task Domain Model

use super::error::{DomainError, Result};
use super::queue::Credentials;
use super::request_log::RequestLog;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Task ID (`{batch_tag}_{n}`, unique within one queue)
pub type TaskId = String;

/// Task lifecycle status
///
/// Transitions are monotonic: `Pending -> Running -> {Completed | Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "PENDING"),
            TaskStatus::Running => write!(f, "RUNNING"),
            TaskStatus::Completed => write!(f, "COMPLETED"),
            TaskStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// Mutable execution state of one submitted job
#[derive(Debug, Clone)]
pub struct TaskRecord {
    pub id: TaskId,
    pub batch_tag: String,
    pub status: TaskStatus,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub request_logs: RequestLog,

    // Copied from queue configuration at submission
    pub credentials: Credentials,
    pub throttle: Option<Duration>,

    pub started_at: Option<i64>, // epoch ms
    pub finished_at: Option<i64>,
}

impl TaskRecord {
    /// Create a pending task
    pub fn new(
        id: impl Into<String>,
        batch_tag: impl Into<String>,
        credentials: Credentials,
        throttle: Option<Duration>,
    ) -> Self {
        Self {
            id: id.into(),
            batch_tag: batch_tag.into(),
            status: TaskStatus::Pending,
            result: None,
            error: None,
            request_logs: RequestLog::default(),
            credentials,
            throttle,
            started_at: None,
            finished_at: None,
        }
    }

    /// Claim: Pending -> Running
    pub fn start(&mut self, now_millis: i64) -> Result<()> {
        if self.status != TaskStatus::Pending {
            return Err(self.invalid_transition(TaskStatus::Running));
        }
        self.status = TaskStatus::Running;
        self.started_at = Some(now_millis);
        Ok(())
    }

    /// Running -> Completed, storing the result in the same step
    pub fn complete(&mut self, result: serde_json::Value, now_millis: i64) -> Result<()> {
        if self.status != TaskStatus::Running {
            return Err(self.invalid_transition(TaskStatus::Completed));
        }
        self.status = TaskStatus::Completed;
        self.result = Some(result);
        self.finished_at = Some(now_millis);
        Ok(())
    }

    /// Running -> Failed, storing the reason and a synthetic result
    pub fn fail(&mut self, reason: impl Into<String>, now_millis: i64) -> Result<()> {
        if self.status != TaskStatus::Running {
            return Err(self.invalid_transition(TaskStatus::Failed));
        }
        let reason = reason.into();
        self.status = TaskStatus::Failed;
        self.result = Some(serde_json::Value::String(format!(
            "Failed to execute job: {}",
            reason
        )));
        self.error = Some(reason);
        self.finished_at = Some(now_millis);
        Ok(())
    }

    /// Read-only view for pollers
    pub fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot {
            id: self.id.clone(),
            batch_tag: self.batch_tag.clone(),
            status: self.status,
            result: self.result.clone(),
            error: self.error.clone(),
            request_count: self.request_logs.len(),
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }

    fn invalid_transition(&self, to: TaskStatus) -> DomainError {
        DomainError::InvalidStateTransition {
            from: self.status.to_string(),
            to: to.to_string(),
        }
    }
}

/// Point-in-time copy of a task, safe to hand out of the lock
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub id: TaskId,
    pub batch_tag: String,
    pub status: TaskStatus,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub request_count: usize,
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,
}

/// Status counters
///
/// `pending + running + completed + failed == total` after every `apply`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCounts {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub pending: usize,
    pub running: usize,
}

impl TaskCounts {
    /// Count a set of statuses
    pub fn tally<'a>(statuses: impl IntoIterator<Item = &'a TaskStatus>) -> Self {
        let mut counts = Self::default();
        for status in statuses {
            counts.total += 1;
            *counts.slot(*status) += 1;
        }
        counts
    }

    /// Record a new pending task
    pub fn add_pending(&mut self) {
        self.total += 1;
        self.pending += 1;
    }

    /// Move one task between two status buckets
    pub fn apply(&mut self, from: TaskStatus, to: TaskStatus) {
        let slot = self.slot(from);
        *slot = slot.saturating_sub(1);
        *self.slot(to) += 1;
    }

    pub fn settled(&self) -> usize {
        self.completed + self.failed
    }

    pub fn is_balanced(&self) -> bool {
        self.pending + self.running + self.completed + self.failed == self.total
    }

    fn slot(&mut self, status: TaskStatus) -> &mut usize {
        match status {
            TaskStatus::Pending => &mut self.pending,
            TaskStatus::Running => &mut self.running,
            TaskStatus::Completed => &mut self.completed,
            TaskStatus::Failed => &mut self.failed,
        }
    }
}
