// Domain Layer - Pure bookkeeping types and entities

pub mod batch;
pub mod error;
pub mod queue;
pub mod request_log;
pub mod task;

// Re-exports
pub use batch::BatchIndex;
pub use error::DomainError;
pub use queue::{Credentials, QueueConfig};
pub use request_log::{RequestLog, RequestLogRecord};
pub use task::{TaskCounts, TaskId, TaskRecord, TaskSnapshot, TaskStatus};
