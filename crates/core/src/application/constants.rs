// Application constants (no magic values)
use std::time::Duration;

/// How long a worker waits on the pending channel before re-checking the stop signal (1s)
pub const RECEIVE_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Rate-limit retry ceiling: a request fails once attempts exceed this
pub const DEFAULT_MAX_ATTEMPTS: u32 = 30;

/// Linear backoff step: the n-th retry sleeps n units (1s)
pub const DEFAULT_BACKOFF_UNIT: Duration = Duration::from_secs(1);

/// Batch tag stamped on request records made outside any task
pub const SESSION_BATCH_TAG: &str = "One Off Request";

/// Path probed by the health-check job
pub const HEALTH_ENDPOINT: &str = "/health";
