// Application Layer - Use Cases and Execution

pub mod constants;
pub mod executor;
pub mod jobs;
pub mod queue;
pub mod retry;

// Re-exports
pub use executor::{ExecutionContext, RequestError, RequestExecutor};
pub use jobs::{JobDescriptor, JobError, JobKind, JobOutcome, JobTarget, TaskContext};
pub use queue::{QueueStats, TaskQueue};
pub use retry::RetryPolicy;
