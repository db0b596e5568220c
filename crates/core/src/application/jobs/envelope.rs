// Response envelope of the remote API: {"success": bool, "message": str, "payload": ...}

use super::{filters, Filter, JobError, TaskContext};
use crate::port::{ApiRequest, ApiResponse};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// How a response is judged successful
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuccessCheck {
    /// `success == true` in the body
    #[default]
    Envelope,
    /// Any 2xx status
    StatusCode,
}

/// Parsed envelope
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub success: bool,
    pub message: Option<String>,
    pub payload: Value,
}

impl Envelope {
    pub fn parse(response: &ApiResponse) -> Result<Self, JobError> {
        let body = response.json().map_err(|e| {
            JobError::InvalidResponse(format!("status {}: {}", response.status, e))
        })?;
        Ok(Self {
            success: body.get("success").and_then(Value::as_bool).unwrap_or(false),
            message: body
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string),
            payload: body.get("payload").cloned().unwrap_or(Value::Null),
        })
    }

    /// List payloads as-is; object payloads yield `data`, or themselves if there is none
    pub fn data(&self) -> Value {
        match &self.payload {
            Value::Object(map) => map.get("data").cloned().unwrap_or_else(|| self.payload.clone()),
            other => other.clone(),
        }
    }

    pub fn total_items(&self) -> u64 {
        self.payload_u64("totalItems")
    }

    pub fn limit(&self) -> u64 {
        self.payload_u64("limit")
    }

    fn payload_u64(&self, key: &str) -> u64 {
        self.payload.get(key).and_then(Value::as_u64).unwrap_or(0)
    }

    fn rejection(&self, response: &ApiResponse) -> JobError {
        JobError::Rejected(self.message.clone().unwrap_or_else(|| {
            format!("Request was not successful (status {})", response.status)
        }))
    }
}

/// Judge a response and extract its result value
pub fn check_success(response: &ApiResponse, check: SuccessCheck) -> Result<Value, JobError> {
    match check {
        SuccessCheck::Envelope => {
            let envelope = Envelope::parse(response)?;
            if !envelope.success {
                return Err(envelope.rejection(response));
            }
            Ok(envelope.data())
        }
        SuccessCheck::StatusCode => {
            if !response.is_success() {
                return Err(JobError::Rejected(format!(
                    "Request failed with status {}",
                    response.status
                )));
            }
            if response.body.trim().is_empty() {
                return Ok(serde_json::json!({ "status": response.status }));
            }
            Ok(response
                .json()
                .unwrap_or_else(|_| Value::String(response.body.clone())))
        }
    }
}

/// GET every page of a list endpoint
///
/// A rejected page stops the walk and keeps what was gathered so far; a
/// rejected first page yields an empty list.
pub async fn fetch_all(
    ctx: &TaskContext,
    endpoint: &str,
    params: &BTreeMap<String, String>,
    filters: &[Filter],
) -> Result<Vec<Value>, JobError> {
    let mut request = ApiRequest::get(endpoint);
    for (key, value) in params {
        request.set_param(key.as_str(), value.as_str());
    }
    if let Some(filter) = filters::render(filters)? {
        request.set_param("filter", filter);
    }

    let response = ctx.request(&request).await?;
    let first = Envelope::parse(&response)?;
    if !first.success {
        warn!(
            endpoint,
            status = response.status,
            message = first.message.as_deref().unwrap_or_default(),
            "First page was not successful, returning no items"
        );
        return Ok(Vec::new());
    }

    let mut items = into_items(first.data());
    let limit = first.limit();
    if limit == 0 {
        return Ok(items);
    }
    let pages = first.total_items().div_ceil(limit);

    for page in 2..=pages {
        request.set_param("page", page.to_string());
        request.set_param("limit", limit.to_string());

        let response = ctx.request(&request).await?;
        let envelope = Envelope::parse(&response)?;
        if !envelope.success {
            warn!(endpoint, page, "Page request was not successful, stopping");
            break;
        }
        let page_items = into_items(envelope.data());
        debug!(endpoint, page, found = page_items.len(), "Fetched page");
        items.extend(page_items);
    }

    Ok(items)
}

fn into_items(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(status: u16, body: Value) -> ApiResponse {
        ApiResponse::new(status, body.to_string())
    }

    #[test]
    fn test_envelope_data_variants() {
        let list = Envelope::parse(&response(200, json!({"success": true, "payload": [1, 2]}))).unwrap();
        assert_eq!(list.data(), json!([1, 2]));

        let paged = Envelope::parse(&response(
            200,
            json!({"success": true, "payload": {"data": [1], "totalItems": 3, "limit": 1}}),
        ))
        .unwrap();
        assert_eq!(paged.data(), json!([1]));
        assert_eq!(paged.total_items(), 3);
        assert_eq!(paged.limit(), 1);

        let object = Envelope::parse(&response(200, json!({"success": true, "payload": {"id": "c1"}}))).unwrap();
        assert_eq!(object.data(), json!({"id": "c1"}));
    }

    #[test]
    fn test_envelope_rejection_uses_message() {
        let err = check_success(
            &response(400, json!({"success": false, "message": "Customer already exists"})),
            SuccessCheck::Envelope,
        )
        .unwrap_err();
        assert_eq!(err, JobError::Rejected("Customer already exists".to_string()));
    }

    #[test]
    fn test_missing_success_flag_is_rejection() {
        let err = check_success(&response(200, json!({"payload": []})), SuccessCheck::Envelope).unwrap_err();
        assert!(matches!(err, JobError::Rejected(_)));
    }

    #[test]
    fn test_non_json_body_is_invalid_response() {
        let err = check_success(&ApiResponse::new(502, "<html>"), SuccessCheck::Envelope).unwrap_err();
        assert!(matches!(err, JobError::InvalidResponse(_)));
    }

    #[test]
    fn test_status_code_mode() {
        assert_eq!(
            check_success(&ApiResponse::new(204, ""), SuccessCheck::StatusCode).unwrap(),
            json!({"status": 204})
        );
        assert_eq!(
            check_success(&response(201, json!({"id": 7})), SuccessCheck::StatusCode).unwrap(),
            json!({"id": 7})
        );
        assert!(check_success(&ApiResponse::new(404, "{}"), SuccessCheck::StatusCode).is_err());
    }
}
