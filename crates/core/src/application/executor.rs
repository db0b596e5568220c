// Request Executor - one outbound call with rate-limit retry and request logging

use crate::domain::request_log::LoggedResponse;
use crate::domain::{Credentials, RequestLog, RequestLogRecord};
use crate::port::time_provider::SystemTimeProvider;
use crate::port::{ApiRequest, ApiResponse, HttpTransport, TimeProvider, TransportError};
use std::sync::Arc;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, error, info};

use super::constants::SESSION_BATCH_TAG;
use super::retry::{RetryDecision, RetryPolicy};

/// Executor errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("Backend URL or API key is missing")]
    MissingCredentials,

    #[error("Max attempts reached ({max_attempts}), request failed")]
    RetriesExhausted { max_attempts: u32 },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Where a call gets its credentials and where its records go
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub credentials: Credentials,
    pub batch_tag: String,
    pub log: RequestLog,
}

impl ExecutionContext {
    /// Context for calls made by a running task
    pub fn for_task(credentials: Credentials, batch_tag: impl Into<String>, log: RequestLog) -> Self {
        Self {
            credentials,
            batch_tag: batch_tag.into(),
            log,
        }
    }

    /// Context for one-off calls outside the queue; records go to `history`
    pub fn session(credentials: Credentials, history: RequestLog) -> Self {
        Self::for_task(credentials, SESSION_BATCH_TAG, history)
    }
}

/// Performs calls through an `HttpTransport`
pub struct RequestExecutor {
    transport: Arc<dyn HttpTransport>,
    policy: RetryPolicy,
    time_provider: Arc<dyn TimeProvider>,
}

impl RequestExecutor {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            policy: RetryPolicy::default(),
            time_provider: Arc::new(SystemTimeProvider),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_time_provider(mut self, time_provider: Arc<dyn TimeProvider>) -> Self {
        self.time_provider = time_provider;
        self
    }

    /// Execute `request` against `ctx.credentials.backend_url`
    ///
    /// Returns the first response that is not a 429. Every attempt, retried
    /// or not, appends one record to `ctx.log`. Transport failures are not
    /// retried.
    ///
    /// # Errors
    /// - `RequestError::MissingCredentials` before any call if key or URL is blank
    /// - `RequestError::RetriesExhausted` once the attempt counter passes the ceiling
    /// - `RequestError::Transport` if the exchange itself fails
    pub async fn execute(
        &self,
        ctx: &ExecutionContext,
        request: &ApiRequest,
    ) -> Result<ApiResponse, RequestError> {
        if !ctx.credentials.is_complete() {
            return Err(RequestError::MissingCredentials);
        }

        let url = format!("{}{}", ctx.credentials.backend_url, request.endpoint);
        let mut attempts: u32 = 0;

        loop {
            if self.policy.is_exhausted(attempts) {
                error!(
                    method = %request.method,
                    url = %url,
                    attempts,
                    "Max attempts reached, giving up"
                );
                return Err(RequestError::RetriesExhausted {
                    max_attempts: self.policy.max_attempts,
                });
            }

            debug!(method = %request.method, url = %url, batch = %ctx.batch_tag, "Making request");
            let response = self
                .transport
                .send(&url, &ctx.credentials.api_key, request)
                .await?;
            info!(
                method = %request.method,
                url = %url,
                status = response.status,
                "Request completed"
            );

            ctx.log.append(self.record(ctx, request, &response));

            match self.policy.decide(&response, attempts) {
                RetryDecision::Retry(delay) => {
                    attempts += 1;
                    sleep(delay).await;
                }
                RetryDecision::Done => return Ok(response),
            }
        }
    }

    fn record(
        &self,
        ctx: &ExecutionContext,
        request: &ApiRequest,
        response: &ApiResponse,
    ) -> RequestLogRecord {
        RequestLogRecord::new(
            request.method.as_str(),
            ctx.credentials.backend_url.clone(),
            request.endpoint.clone(),
            request.payload.clone(),
            LoggedResponse {
                status: response.status,
                body: response.body.clone(),
            },
            ctx.batch_tag.clone(),
            self.time_provider.now(),
        )
    }
}
