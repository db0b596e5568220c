// Request Log - audit trail of outbound calls

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

static RECORD_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Status and body of a logged response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggedResponse {
    pub status: u16,
    pub body: String,
}

/// One outbound call attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestLogRecord {
    pub method: String,
    pub target_url: String,
    pub endpoint: String,
    pub payload: Option<serde_json::Value>,
    pub response: LoggedResponse,
    pub timestamp: String,
    pub content_hash: String,
    pub batch_tag: String,
}

impl RequestLogRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        method: impl Into<String>,
        target_url: impl Into<String>,
        endpoint: impl Into<String>,
        payload: Option<serde_json::Value>,
        response: LoggedResponse,
        batch_tag: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        let method = method.into();
        let target_url = target_url.into();
        let endpoint = endpoint.into();

        // Sequence keeps hashes distinct for attempts within the same microsecond
        let sequence = RECORD_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        let mut hasher = Sha256::new();
        hasher.update(at.format("%Y-%m-%d %H:%M:%S%.6f").to_string().as_bytes());
        hasher.update(sequence.to_le_bytes());
        hasher.update(method.as_bytes());
        hasher.update(target_url.as_bytes());
        hasher.update(endpoint.as_bytes());

        Self {
            method,
            target_url,
            endpoint,
            payload,
            response,
            timestamp: at.format("%Y-%m-%d %H:%M:%S").to_string(),
            content_hash: hex::encode(hasher.finalize()),
            batch_tag: batch_tag.into(),
        }
    }
}

#[derive(Debug, Default)]
struct LogInner {
    records: Vec<RequestLogRecord>,
    hashes: HashSet<String>,
}

/// Shared, append-only list of request records
///
/// Cloning yields another handle to the same list. Used both as a task's
/// own log and as the running session history that task logs merge into.
#[derive(Debug, Clone, Default)]
pub struct RequestLog {
    inner: Arc<Mutex<LogInner>>,
}

impl RequestLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, record: RequestLogRecord) {
        let mut inner = self.lock();
        inner.hashes.insert(record.content_hash.clone());
        inner.records.push(record);
    }

    /// Append records whose hash is not present yet; returns how many were added
    pub fn merge_unique<I>(&self, records: I) -> usize
    where
        I: IntoIterator<Item = RequestLogRecord>,
    {
        let mut inner = self.lock();
        let mut added = 0;
        for record in records {
            if inner.hashes.insert(record.content_hash.clone()) {
                inner.records.push(record);
                added += 1;
            }
        }
        added
    }

    pub fn records(&self) -> Vec<RequestLogRecord> {
        self.lock().records.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, LogInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
