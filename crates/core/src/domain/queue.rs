// Queue Configuration

use super::error::{DomainError, Result};
use crate::AppError;
use serde::{Deserialize, Serialize};

/// Default number of worker loops
pub const DEFAULT_WORKER_COUNT: usize = 10;

pub const ENV_API_KEY: &str = "BATCHLINE_API_KEY";
pub const ENV_BACKEND_URL: &str = "BATCHLINE_BACKEND_URL";
pub const ENV_WORKERS: &str = "BATCHLINE_WORKERS";

/// Remote API credentials
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub api_key: String,
    pub backend_url: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, backend_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            backend_url: backend_url.into(),
        }
    }

    /// Both values present
    pub fn is_complete(&self) -> bool {
        !self.api_key.trim().is_empty() && !self.backend_url.trim().is_empty()
    }
}

// Keep the key out of logs
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"***")
            .field("backend_url", &self.backend_url)
            .finish()
    }
}

/// Queue configuration
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub credentials: Credentials,
    pub worker_count: usize,
}

impl QueueConfig {
    pub fn new(
        api_key: impl Into<String>,
        backend_url: impl Into<String>,
        worker_count: usize,
    ) -> Self {
        Self {
            credentials: Credentials::new(api_key, backend_url),
            worker_count,
        }
    }

    /// Load from `BATCHLINE_API_KEY`, `BATCHLINE_BACKEND_URL`, `BATCHLINE_WORKERS`
    pub fn from_env() -> crate::Result<Self> {
        let api_key = std::env::var(ENV_API_KEY)
            .map_err(|_| AppError::Config(format!("{} is not set", ENV_API_KEY)))?;
        let backend_url = std::env::var(ENV_BACKEND_URL)
            .map_err(|_| AppError::Config(format!("{} is not set", ENV_BACKEND_URL)))?;
        let worker_count = match std::env::var(ENV_WORKERS) {
            Ok(raw) => raw.trim().parse::<usize>().map_err(|_| {
                AppError::Config(format!("{} must be a positive integer, got '{}'", ENV_WORKERS, raw))
            })?,
            Err(_) => DEFAULT_WORKER_COUNT,
        };

        let config = Self::new(api_key, backend_url, worker_count);
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.credentials.api_key.trim().is_empty() {
            return Err(DomainError::ValidationError(
                "API key cannot be empty".to_string(),
            ));
        }
        if self.credentials.backend_url.trim().is_empty() {
            return Err(DomainError::ValidationError(
                "Backend URL cannot be empty".to_string(),
            ));
        }
        if self.worker_count == 0 {
            return Err(DomainError::ValidationError(
                "Worker count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_complete_config() {
        let config = QueueConfig::new("key", "https://api.example.com", 4);
        assert!(config.validate().is_ok());
        assert!(config.credentials.is_complete());
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let config = QueueConfig::new("key", "https://api.example.com", 0);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("at least 1"));
    }

    #[test]
    fn test_validate_rejects_blank_credentials() {
        assert!(QueueConfig::new("  ", "https://api.example.com", 1)
            .validate()
            .is_err());
        assert!(QueueConfig::new("key", "", 1).validate().is_err());
    }

    // Only test touching the BATCHLINE_* variables
    #[test]
    fn test_from_env() {
        std::env::set_var(ENV_API_KEY, "env-key");
        std::env::set_var(ENV_BACKEND_URL, "https://api.example.com");
        std::env::remove_var(ENV_WORKERS);
        let config = QueueConfig::from_env().unwrap();
        assert_eq!(config.credentials.api_key, "env-key");
        assert_eq!(config.worker_count, DEFAULT_WORKER_COUNT);

        std::env::set_var(ENV_WORKERS, "many");
        let err = QueueConfig::from_env().unwrap_err();
        assert!(matches!(err, AppError::Config(_)));

        std::env::set_var(ENV_WORKERS, "0");
        let err = QueueConfig::from_env().unwrap_err();
        assert!(matches!(err, AppError::Domain(_)));

        std::env::remove_var(ENV_API_KEY);
        std::env::remove_var(ENV_BACKEND_URL);
        std::env::remove_var(ENV_WORKERS);
        assert!(matches!(QueueConfig::from_env(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_debug_hides_api_key() {
        let credentials = Credentials::new("secret-token", "https://api.example.com");
        let rendered = format!("{:?}", credentials);
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("api.example.com"));
    }
}
