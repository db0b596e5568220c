//! Logging setup
//!
//! Logs go to stderr so stdout stays machine-readable.

use anyhow::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// `BATCHLINE_LOG_FORMAT`: `json` or `pretty` (default)
pub const ENV_LOG_FORMAT: &str = "BATCHLINE_LOG_FORMAT";

const DEFAULT_FILTER: &str = "batchline=info,batchline_core=info,batchline_infra_http=info";

pub fn init() -> Result<()> {
    let log_format = std::env::var(ENV_LOG_FORMAT).unwrap_or_else(|_| "pretty".to_string());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))?;

    match log_format.as_str() {
        "json" => {
            // Production: JSON structured logging
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .try_init()?;
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty().with_writer(std::io::stderr))
                .try_init()?;
        }
    }
    Ok(())
}
