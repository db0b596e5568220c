//! JSON-lines job file
//!
//! One job per line, blank lines and `#` comments skipped:
//!
//! ```text
//! {"kind": "health_check"}
//! {"kind": "api_call", "method": "POST", "endpoint": "/v3/customers", "payload": {"name": "Acme"}}
//! {"kind": "fetch_all", "endpoint": "/v3/events", "throttle_seconds": 1}
//! ```

use anyhow::{Context, Result};
use batchline_core::application::JobKind;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JobLine {
    #[serde(flatten)]
    pub kind: JobKind,
    /// Overrides the run-wide `--throttle`
    #[serde(default)]
    pub throttle_seconds: Option<f64>,
}

pub fn parse(content: &str) -> Result<Vec<JobLine>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(index, line)| {
            serde_json::from_str(line).with_context(|| format!("Invalid job on line {}", index + 1))
        })
        .collect()
}

pub fn load(path: &Path) -> Result<Vec<JobLine>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read job file {}", path.display()))?;
    parse(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use batchline_core::application::jobs::ApiCallArgs;
    use batchline_core::port::Method;

    #[test]
    fn test_parse_skips_blank_and_comment_lines() {
        let content = r#"
# health first
{"kind": "health_check"}

{"kind": "api_call", "method": "DELETE", "endpoint": "/v3/customers/c1", "check": "status_code", "throttle_seconds": 0.5}
"#;
        let jobs = parse(content).unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].kind, JobKind::HealthCheck);
        assert_eq!(jobs[0].throttle_seconds, None);
        assert!(matches!(
            &jobs[1].kind,
            JobKind::ApiCall(ApiCallArgs { method: Method::Delete, .. })
        ));
        assert_eq!(jobs[1].throttle_seconds, Some(0.5));
    }

    #[test]
    fn test_parse_reports_line_number() {
        let err = parse("{\"kind\": \"health_check\"}\n{\"kind\": \"nope\"}").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }
}
