use garde::Validate;
use serde::Deserialize;
use std::time::Duration;

use crate::services::polling::PollPolicy;

#[derive(Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000"). Unused by `scan-watch`.
    #[serde(default = "default_bind_addr")]
    #[garde(length(min = 1))]
    pub bind_addr: String,

    /// Base URL of the backend scan service
    #[garde(length(min = 1))]
    pub scan_api_base_url: String,

    /// Bearer token sent to the scan service
    #[garde(skip)]
    pub scan_api_token: Option<String>,

    /// Delay between status polls
    #[serde(default = "default_poll_interval_ms")]
    #[garde(range(min = 1))]
    pub poll_interval_ms: u64,

    /// Give up on a scan after this many seconds, at most one week. 0 disables the limit.
    #[serde(default = "default_max_poll_secs")]
    #[garde(range(max = 604_800))]
    pub max_poll_secs: u64,

    /// Per-request timeout for scan service calls
    #[serde(default = "default_request_timeout_secs")]
    #[garde(range(min = 1, max = 300))]
    pub request_timeout_secs: u64,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_max_poll_secs() -> u64 {
    30 * 60
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let config: Self = envy::from_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(self.poll_interval_ms),
            max_duration: (self.max_poll_secs > 0).then(|| Duration::from_secs(self.max_poll_secs)),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration from environment: {0}")]
    Env(#[from] envy::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(#[from] garde::Report),
}
