// HTTP Transport Port
// Abstraction over the outbound client so the executor can be tested without a network

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Supported verbs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Method {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            "PATCH" => Ok(Method::Patch),
            other => Err(TransportError::InvalidRequest(format!(
                "Invalid method: {}",
                other
            ))),
        }
    }
}

/// File sent as a multipart part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub field: String,
    pub file_name: String,
    pub content: Vec<u8>,
}

/// One outbound call, relative to the configured backend URL
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub endpoint: String,
    pub payload: Option<serde_json::Value>,
    pub params: Vec<(String, String)>,
    /// Only sent with POST
    pub attachments: Vec<Attachment>,
}

impl ApiRequest {
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            payload: None,
            params: Vec::new(),
            attachments: Vec::new(),
        }
    }

    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(Method::Get, endpoint)
    }

    pub fn post(endpoint: impl Into<String>, payload: serde_json::Value) -> Self {
        Self::new(Method::Post, endpoint).with_payload(payload)
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_param(key, value);
        self
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Insert or replace a query parameter
    pub fn set_param(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.params.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.params.push((key, value)),
        }
    }
}

/// Raw response of one attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// HTTP 429 Too Many Requests
    pub fn is_rate_limited(&self) -> bool {
        self.status == 429
    }

    pub fn json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

/// Transport errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Failed to read response body: {0}")]
    Body(String),
}

/// HTTP Transport trait
///
/// Implementations:
/// - ReqwestTransport (infra-http): real network calls
/// - MockTransport: scripted responses for tests
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Perform exactly one call against `url` (backend URL + endpoint)
    ///
    /// Non-2xx statuses are NOT errors; only failures to complete the
    /// exchange are.
    async fn send(
        &self,
        url: &str,
        api_key: &str,
        request: &ApiRequest,
    ) -> Result<ApiResponse, TransportError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Scripted reply
    #[derive(Debug, Clone)]
    pub enum MockReply {
        Respond(u16, String),
        Fail(String),
    }

    /// What the mock saw
    #[derive(Debug, Clone, PartialEq)]
    pub struct RecordedCall {
        pub url: String,
        pub api_key: String,
        pub request: ApiRequest,
    }

    /// Mock transport: plays back `script` in order, then `fallback` forever
    pub struct MockTransport {
        script: Mutex<VecDeque<MockReply>>,
        fallback: MockReply,
        calls: Mutex<Vec<RecordedCall>>,
    }

    impl MockTransport {
        pub fn new(script: Vec<MockReply>, fallback: MockReply) -> Self {
            Self {
                script: Mutex::new(script.into()),
                fallback,
                calls: Mutex::new(Vec::new()),
            }
        }

        /// Always answer 200 with `body`
        pub fn new_ok(body: impl Into<String>) -> Self {
            Self::new(Vec::new(), MockReply::Respond(200, body.into()))
        }

        /// `n` rate-limited replies, then `final_status`
        pub fn new_rate_limited(n: usize, final_status: u16, body: impl Into<String>) -> Self {
            let script = (0..n)
                .map(|_| MockReply::Respond(429, "{}".to_string()))
                .collect();
            Self::new(script, MockReply::Respond(final_status, body.into()))
        }

        pub fn new_fail(message: impl Into<String>) -> Self {
            Self::new(Vec::new(), MockReply::Fail(message.into()))
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        pub fn calls(&self) -> Vec<RecordedCall> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HttpTransport for MockTransport {
        async fn send(
            &self,
            url: &str,
            api_key: &str,
            request: &ApiRequest,
        ) -> Result<ApiResponse, TransportError> {
            self.calls.lock().unwrap().push(RecordedCall {
                url: url.to_string(),
                api_key: api_key.to_string(),
                request: request.clone(),
            });

            let reply = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| self.fallback.clone());

            match reply {
                MockReply::Respond(status, body) => Ok(ApiResponse::new(status, body)),
                MockReply::Fail(msg) => Err(TransportError::Connection(msg)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_parse_roundtrip() {
        for method in [
            Method::Get,
            Method::Post,
            Method::Put,
            Method::Delete,
            Method::Patch,
        ] {
            assert_eq!(method.as_str().parse::<Method>().unwrap(), method);
        }
        assert_eq!("patch".parse::<Method>().unwrap(), Method::Patch);
        assert!("TRACE".parse::<Method>().is_err());
    }

    #[test]
    fn test_set_param_replaces_existing() {
        let mut request = ApiRequest::get("/v3/customers").with_param("limit", "500");
        request.set_param("page", "2");
        request.set_param("limit", "100");
        assert_eq!(
            request.params,
            vec![
                ("limit".to_string(), "100".to_string()),
                ("page".to_string(), "2".to_string()),
            ]
        );
    }

    #[test]
    fn test_response_classification() {
        assert!(ApiResponse::new(429, "").is_rate_limited());
        assert!(!ApiResponse::new(429, "").is_success());
        assert!(ApiResponse::new(204, "").is_success());
        assert!(!ApiResponse::new(503, "").is_rate_limited());
    }
}
