// Built-in job kinds

use super::envelope::{self, SuccessCheck};
use super::{Filter, JobError, JobOutcome, JobTarget, TaskContext};
use crate::application::constants::HEALTH_ENDPOINT;
use crate::port::{ApiRequest, Method};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// One call against the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiCallArgs {
    pub method: Method,
    pub endpoint: String,
    #[serde(default)]
    pub payload: Option<Value>,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    #[serde(default)]
    pub check: SuccessCheck,
}

/// Every page of a list endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchAllArgs {
    pub endpoint: String,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    #[serde(default)]
    pub filters: Vec<Filter>,
}

/// Closed set of built-in jobs, tagged by `kind` in JSON
///
/// ```text
/// {"kind": "health_check"}
/// {"kind": "api_call", "method": "POST", "endpoint": "/v3/customers", "payload": {...}}
/// {"kind": "fetch_all", "endpoint": "/v3/events", "filters": [...]}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobKind {
    HealthCheck,
    ApiCall(ApiCallArgs),
    FetchAll(FetchAllArgs),
}

#[async_trait]
impl JobTarget for JobKind {
    fn name(&self) -> &str {
        match self {
            JobKind::HealthCheck => "health_check",
            JobKind::ApiCall(_) => "api_call",
            JobKind::FetchAll(_) => "fetch_all",
        }
    }

    async fn run(&self, ctx: TaskContext) -> JobOutcome {
        match self {
            JobKind::HealthCheck => {
                let response = ctx.request(&ApiRequest::get(HEALTH_ENDPOINT)).await?;
                if !response.is_success() {
                    return Err(JobError::Rejected(format!(
                        "Health check failed with status {}",
                        response.status
                    )));
                }
                Ok(json!({ "status": response.status }))
            }
            JobKind::ApiCall(args) => {
                let mut request = ApiRequest::new(args.method, args.endpoint.as_str());
                request.payload = args.payload.clone();
                for (key, value) in &args.params {
                    request.set_param(key.as_str(), value.as_str());
                }
                let response = ctx.request(&request).await?;
                envelope::check_success(&response, args.check)
            }
            JobKind::FetchAll(args) => {
                let items =
                    envelope::fetch_all(&ctx, &args.endpoint, &args.params, &args.filters).await?;
                Ok(Value::Array(items))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::executor::RequestExecutor;
    use crate::domain::{Credentials, RequestLog};
    use crate::port::http_transport::mocks::{MockReply, MockTransport};
    use std::sync::Arc;

    fn context(transport: Arc<MockTransport>) -> TaskContext {
        TaskContext::new(
            "B1_0",
            "B1",
            Credentials::new("key", "http://api.test"),
            RequestLog::new(),
            Arc::new(RequestExecutor::new(transport)),
        )
    }

    fn reply(body: Value) -> MockReply {
        MockReply::Respond(200, body.to_string())
    }

    #[test]
    fn test_deserialize_tagged_kinds() {
        let health: JobKind = serde_json::from_str(r#"{"kind":"health_check"}"#).unwrap();
        assert_eq!(health, JobKind::HealthCheck);

        let call: JobKind = serde_json::from_str(
            r#"{"kind":"api_call","method":"POST","endpoint":"/v3/customers","payload":{"name":"Acme"}}"#,
        )
        .unwrap();
        match call {
            JobKind::ApiCall(args) => {
                assert_eq!(args.method, Method::Post);
                assert_eq!(args.check, SuccessCheck::Envelope);
                assert_eq!(args.payload, Some(json!({"name": "Acme"})));
            }
            other => panic!("unexpected kind: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_health_check() {
        let transport = Arc::new(MockTransport::new_ok("ok"));
        let ctx = context(transport.clone());
        let log = ctx.request_logs.clone();

        let result = JobKind::HealthCheck.run(ctx).await.unwrap();

        assert_eq!(result, json!({"status": 200}));
        assert_eq!(transport.calls()[0].url, "http://api.test/health");
        assert_eq!(log.len(), 1);
    }

    #[tokio::test]
    async fn test_api_call_rejected_envelope() {
        let transport = Arc::new(MockTransport::new(
            vec![reply(json!({"success": false, "message": "Duplicate name"}))],
            MockReply::Fail("unexpected".to_string()),
        ));
        let job = JobKind::ApiCall(ApiCallArgs {
            method: Method::Post,
            endpoint: "/v3/customers".to_string(),
            payload: Some(json!({"name": "Acme"})),
            params: BTreeMap::new(),
            check: SuccessCheck::Envelope,
        });

        let err = job.run(context(transport)).await.unwrap_err();
        assert_eq!(err.to_string(), "Duplicate name");
    }

    #[tokio::test]
    async fn test_fetch_all_walks_pages() {
        let transport = Arc::new(MockTransport::new(
            vec![
                reply(json!({"success": true, "payload": {"data": [1, 2], "totalItems": 5, "limit": 2}})),
                reply(json!({"success": true, "payload": {"data": [3, 4], "totalItems": 5, "limit": 2}})),
                reply(json!({"success": true, "payload": {"data": [5], "totalItems": 5, "limit": 2}})),
            ],
            MockReply::Fail("too many pages".to_string()),
        ));
        let job = JobKind::FetchAll(FetchAllArgs {
            endpoint: "/v3/events".to_string(),
            params: BTreeMap::new(),
            filters: vec![Filter::eq("customerId", "c1")],
        });

        let result = job.run(context(transport.clone())).await.unwrap();

        assert_eq!(result, json!([1, 2, 3, 4, 5]));
        let calls = transport.calls();
        assert_eq!(calls.len(), 3);
        assert!(calls[0]
            .request
            .params
            .contains(&("filter".to_string(), "customerId:eq:\"c1\"".to_string())));
        assert!(calls[2]
            .request
            .params
            .contains(&("page".to_string(), "3".to_string())));
    }

    #[tokio::test]
    async fn test_fetch_all_keeps_partial_results() {
        let transport = Arc::new(MockTransport::new(
            vec![
                reply(json!({"success": true, "payload": {"data": ["a"], "totalItems": 3, "limit": 1}})),
                reply(json!({"success": false, "message": "boom"})),
            ],
            MockReply::Fail("should stop after rejected page".to_string()),
        ));
        let job = JobKind::FetchAll(FetchAllArgs {
            endpoint: "/v3/customers".to_string(),
            params: BTreeMap::new(),
            filters: Vec::new(),
        });

        let result = job.run(context(transport.clone())).await.unwrap();
        assert_eq!(result, json!(["a"]));
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test]
    async fn test_fetch_all_rejected_first_page_is_empty() {
        let transport = Arc::new(MockTransport::new(
            vec![reply(json!({"success": false, "message": "nope"}))],
            MockReply::Fail("should stop after rejected page".to_string()),
        ));
        let job = JobKind::FetchAll(FetchAllArgs {
            endpoint: "/v3/customers".to_string(),
            params: BTreeMap::new(),
            filters: Vec::new(),
        });

        let result = job.run(context(transport.clone())).await.unwrap();
        assert_eq!(result, json!([]));
        assert_eq!(transport.call_count(), 1);
    }
}
