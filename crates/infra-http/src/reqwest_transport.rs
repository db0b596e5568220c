// Reqwest transport implementation
// reason: one pooled async client shared by every worker
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::multipart::{Form, Part};
use std::time::Duration;
use tracing::debug;

use batchline_core::port::{ApiRequest, ApiResponse, HttpTransport, Method, TransportError};

/// Default per-call timeout (30s)
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Reqwest-backed transport
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport with the given per-call timeout
    ///
    /// # Example
    /// ```ignore
    /// let transport = ReqwestTransport::new(DEFAULT_REQUEST_TIMEOUT)?;
    /// let executor = RequestExecutor::new(Arc::new(transport));
    /// ```
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::InvalidRequest(format!("Failed to build client: {}", e)))?;
        Ok(Self { client })
    }

    fn method(method: Method) -> reqwest::Method {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
            Method::Patch => reqwest::Method::PATCH,
        }
    }

    fn build(&self, url: &str, api_key: &str, request: &ApiRequest) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .request(Self::method(request.method), url)
            .header(AUTHORIZATION, api_key);

        if !request.params.is_empty() {
            builder = builder.query(&request.params);
        }

        // Files replace the JSON body; GET and DELETE never carry one
        if request.method == Method::Post && !request.attachments.is_empty() {
            let form = request.attachments.iter().fold(Form::new(), |form, file| {
                form.part(
                    file.field.clone(),
                    Part::bytes(file.content.clone()).file_name(file.file_name.clone()),
                )
            });
            builder = builder.multipart(form);
        } else if !matches!(request.method, Method::Get | Method::Delete) {
            if let Some(payload) = &request.payload {
                builder = builder.json(payload);
            }
        }

        builder
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(
        &self,
        url: &str,
        api_key: &str,
        request: &ApiRequest,
    ) -> Result<ApiResponse, TransportError> {
        let response = self
            .build(url, api_key, request)
            .send()
            .await
            .map_err(|e| {
                if e.is_builder() {
                    TransportError::InvalidRequest(e.to_string())
                } else {
                    TransportError::Connection(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Body(e.to_string()))?;

        debug!(method = %request.method, url, status, bytes = body.len(), "Response received");
        Ok(ApiResponse::new(status, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use batchline_core::port::Attachment;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport() -> ReqwestTransport {
        ReqwestTransport::new(Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_get_sends_raw_key_and_params() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/customers"))
            .and(header("Authorization", "secret-key"))
            .and(query_param("limit", "500"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"success":true}"#))
            .expect(1)
            .mount(&server)
            .await;

        let request = ApiRequest::get("/v3/customers").with_param("limit", "500");
        let url = format!("{}/v3/customers", server.uri());
        let response = transport().send(&url, "secret-key", &request).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.body, r#"{"success":true}"#);
    }

    #[tokio::test]
    async fn test_get_ignores_payload() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/invoices"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .expect(1)
            .mount(&server)
            .await;

        let request = ApiRequest::get("/v3/invoices").with_payload(json!({"ignored": true}));
        let url = format!("{}/v3/invoices", server.uri());
        transport().send(&url, "k", &request).await.unwrap();

        let received = server.received_requests().await.unwrap();
        assert!(received[0].body.is_empty());
        assert!(received[0].headers.get("content-type").is_none());
    }

    #[tokio::test]
    async fn test_post_sends_json_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3/customers"))
            .and(body_json(json!({"name": "Acme"})))
            .respond_with(ResponseTemplate::new(201).set_body_string("{}"))
            .expect(1)
            .mount(&server)
            .await;

        let request = ApiRequest::post("/v3/customers", json!({"name": "Acme"}));
        let url = format!("{}/v3/customers", server.uri());
        let response = transport().send(&url, "k", &request).await.unwrap();

        assert_eq!(response.status, 201);
    }

    #[tokio::test]
    async fn test_rate_limit_status_is_passed_through() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(429))
            .expect(1)
            .mount(&server)
            .await;

        let request = ApiRequest::new(Method::Patch, "/v3/contracts/1").with_payload(json!({}));
        let url = format!("{}/v3/contracts/1", server.uri());
        let response = transport().send(&url, "k", &request).await.unwrap();

        assert!(response.is_rate_limited());
    }

    #[tokio::test]
    async fn test_post_with_attachment_is_multipart() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3/billing-schedules/upload"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .expect(1)
            .mount(&server)
            .await;

        let request = ApiRequest::new(Method::Post, "/v3/billing-schedules/upload").with_attachment(
            Attachment {
                field: "file".to_string(),
                file_name: "schedule.csv".to_string(),
                content: b"a,b\n1,2\n".to_vec(),
            },
        );
        let url = format!("{}/v3/billing-schedules/upload", server.uri());
        transport().send(&url, "k", &request).await.unwrap();

        let received = server.received_requests().await.unwrap();
        let content_type = received[0]
            .headers
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        assert!(content_type.starts_with("multipart/form-data"));
    }

    #[tokio::test]
    async fn test_connection_failure() {
        // Reserve a free port, then release it so nothing is listening
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let url = format!("http://127.0.0.1:{}/health", port);

        let err = tokio_test::assert_err!(
            transport()
                .send(&url, "k", &ApiRequest::get("/health"))
                .await
        );
        assert!(matches!(err, TransportError::Connection(_)));
    }
}
