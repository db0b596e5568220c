// Jobs - what a worker runs
//
// A job target is a typed operation; the worker hands it a `TaskContext`
// carrying the task's own credentials and request log.

pub mod envelope;
pub mod filters;
pub mod kinds;

pub use envelope::{Envelope, SuccessCheck};
pub use filters::{Filter, FilterRule};
pub use kinds::{ApiCallArgs, FetchAllArgs, JobKind};

use super::executor::{ExecutionContext, RequestError, RequestExecutor};
use crate::domain::{Credentials, RequestLog, TaskId};
use crate::error::{AppError, Result};
use crate::port::{ApiRequest, ApiResponse};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Why a job failed; the display string becomes the task's `error`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    #[error(transparent)]
    Request(#[from] RequestError),

    #[error("{0}")]
    Rejected(String),

    #[error("Job returned no result")]
    NoResult,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Job panicked: {0}")]
    Panicked(String),

    #[error("{0}")]
    Failed(String),
}

/// Outcome of one job run. `Ok(Value::Null)` is treated as a failure.
pub type JobOutcome = std::result::Result<serde_json::Value, JobError>;

/// Everything a running job may use
#[derive(Clone)]
pub struct TaskContext {
    pub task_id: TaskId,
    pub batch_tag: String,
    pub credentials: Credentials,
    pub request_logs: RequestLog,
    executor: Arc<RequestExecutor>,
}

impl TaskContext {
    pub fn new(
        task_id: impl Into<String>,
        batch_tag: impl Into<String>,
        credentials: Credentials,
        request_logs: RequestLog,
        executor: Arc<RequestExecutor>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            batch_tag: batch_tag.into(),
            credentials,
            request_logs,
            executor,
        }
    }

    /// Executor context bound to this task's credentials and log
    pub fn execution_context(&self) -> ExecutionContext {
        ExecutionContext::for_task(
            self.credentials.clone(),
            self.batch_tag.clone(),
            self.request_logs.clone(),
        )
    }

    /// Make one call as this task
    pub async fn request(&self, request: &ApiRequest) -> std::result::Result<ApiResponse, RequestError> {
        self.executor
            .execute(&self.execution_context(), request)
            .await
    }
}

impl std::fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskContext")
            .field("task_id", &self.task_id)
            .field("batch_tag", &self.batch_tag)
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

/// An executable operation
///
/// Implementations:
/// - `JobKind`: the built-in health check, single call and paginated fetch
/// - any embedder type wrapping its own typed arguments
#[async_trait]
pub trait JobTarget: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Run once; the worker never calls this twice for one task
    async fn run(&self, ctx: TaskContext) -> JobOutcome;
}

/// Immutable description of one unit of work
#[derive(Clone)]
pub struct JobDescriptor {
    pub target: Arc<dyn JobTarget>,
    pub batch_tag: String,
    pub throttle: Option<Duration>,
}

impl JobDescriptor {
    pub fn new(target: impl JobTarget + 'static, batch_tag: impl Into<String>) -> Self {
        Self::from_arc(Arc::new(target), batch_tag)
    }

    pub fn from_arc(target: Arc<dyn JobTarget>, batch_tag: impl Into<String>) -> Self {
        Self {
            target,
            batch_tag: batch_tag.into(),
            throttle: None,
        }
    }

    /// Delay the worker after this job settles
    pub fn with_throttle(mut self, throttle: Duration) -> Self {
        self.throttle = Some(throttle);
        self
    }

    /// Throttle given in (possibly fractional) seconds; must be a
    /// non-negative value that fits a `Duration`
    pub fn with_throttle_secs(self, seconds: f64) -> Result<Self> {
        let throttle = Duration::try_from_secs_f64(seconds).map_err(|e| {
            AppError::Validation(format!(
                "Throttle must be a non-negative number of seconds, got {}: {}",
                seconds, e
            ))
        })?;
        Ok(self.with_throttle(throttle))
    }
}

impl std::fmt::Debug for JobDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobDescriptor")
            .field("target", &self.target.name())
            .field("batch_tag", &self.batch_tag)
            .field("throttle", &self.throttle)
            .finish()
    }
}
