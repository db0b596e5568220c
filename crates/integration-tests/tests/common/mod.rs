//! Shared fixtures for queue tests

#![allow(dead_code)]

use async_trait::async_trait;
use batchline_core::application::{
    JobError, JobOutcome, JobTarget, RequestExecutor, RetryPolicy, TaskContext, TaskQueue,
};
use batchline_core::domain::QueueConfig;
use batchline_core::port::http_transport::mocks::MockTransport;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const API_KEY: &str = "test-key";
pub const BACKEND_URL: &str = "http://api.test";

/// Queue over `transport` with a millisecond backoff unit
pub fn queue_with(transport: Arc<MockTransport>, workers: usize) -> TaskQueue {
    let executor = RequestExecutor::new(transport)
        .with_policy(RetryPolicy::new(30, Duration::from_millis(5)));
    TaskQueue::new(
        QueueConfig::new(API_KEY, BACKEND_URL, workers),
        Arc::new(executor),
    )
    .unwrap()
}

/// Queue for jobs that never touch the network
pub fn offline_queue(workers: usize) -> TaskQueue {
    queue_with(Arc::new(MockTransport::new_ok("{}")), workers)
}

/// Poll until every task settled; panics after `limit`
pub async fn wait_until_done(queue: &TaskQueue, limit: Duration) {
    let started = Instant::now();
    while !queue.is_done() {
        assert!(
            started.elapsed() < limit,
            "Queue did not drain within {:?}: {:?}",
            limit,
            queue.stats()
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Returns its value
pub struct Echo(pub Value);

#[async_trait]
impl JobTarget for Echo {
    fn name(&self) -> &str {
        "echo"
    }

    async fn run(&self, _ctx: TaskContext) -> JobOutcome {
        Ok(self.0.clone())
    }
}

/// Sleeps, then returns its value
pub struct Slow(pub Duration, pub Value);

#[async_trait]
impl JobTarget for Slow {
    fn name(&self) -> &str {
        "slow"
    }

    async fn run(&self, _ctx: TaskContext) -> JobOutcome {
        tokio::time::sleep(self.0).await;
        Ok(self.1.clone())
    }
}

/// Always fails with its message
pub struct Fails(pub String);

#[async_trait]
impl JobTarget for Fails {
    fn name(&self) -> &str {
        "fails"
    }

    async fn run(&self, _ctx: TaskContext) -> JobOutcome {
        Err(JobError::Failed(self.0.clone()))
    }
}

pub struct Panics;

#[async_trait]
impl JobTarget for Panics {
    fn name(&self) -> &str {
        "panics"
    }

    async fn run(&self, _ctx: TaskContext) -> JobOutcome {
        panic!("job exploded");
    }
}

/// Succeeds with nothing
pub struct ReturnsNull;

#[async_trait]
impl JobTarget for ReturnsNull {
    fn name(&self) -> &str {
        "returns_null"
    }

    async fn run(&self, _ctx: TaskContext) -> JobOutcome {
        Ok(Value::Null)
    }
}
