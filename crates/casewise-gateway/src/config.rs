//! Collaborator service configuration.

use std::fmt;
use std::time::Duration;

use casewise_core::defaults;
use casewise_core::{Error, Result};

/// Connection settings for the collaborator service.
#[derive(Clone)]
pub struct GatewayConfig {
    /// Base URL, e.g. `http://localhost:3001`.
    pub base_url: String,
    /// Shared service credential sent as `x-api-key`.
    pub api_key: String,
    /// Timeout for liveness checks in seconds.
    pub short_timeout_secs: u64,
    /// Timeout for data operations in seconds.
    pub long_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::BACKEND_URL.to_string(),
            api_key: defaults::WORKER_API_KEY.to_string(),
            short_timeout_secs: defaults::HTTP_TIMEOUT_SHORT_SECS,
            long_timeout_secs: defaults::HTTP_TIMEOUT_LONG_SECS,
        }
    }
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.masked_api_key())
            .field("short_timeout_secs", &self.short_timeout_secs)
            .field("long_timeout_secs", &self.long_timeout_secs)
            .finish()
    }
}

impl GatewayConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `BACKEND_URL` | `http://localhost:3001` | Collaborator base URL |
    /// | `WORKER_API_KEY` | `worker-secret-key` | Service credential |
    /// | `HTTP_TIMEOUT_SHORT_SECS` | `5` | Health check timeout |
    /// | `HTTP_TIMEOUT_LONG_SECS` | `10` | Data operation timeout |
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("BACKEND_URL").unwrap_or_else(|_| defaults::BACKEND_URL.to_string());
        let api_key = std::env::var("WORKER_API_KEY")
            .unwrap_or_else(|_| defaults::WORKER_API_KEY.to_string());

        let short_timeout_secs = std::env::var("HTTP_TIMEOUT_SHORT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::HTTP_TIMEOUT_SHORT_SECS)
            .max(1);

        let long_timeout_secs = std::env::var("HTTP_TIMEOUT_LONG_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::HTTP_TIMEOUT_LONG_SECS)
            .max(1);

        Self {
            base_url,
            api_key,
            short_timeout_secs,
            long_timeout_secs,
        }
    }

    /// Point the config at another collaborator instance.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    pub fn with_timeouts(mut self, short_secs: u64, long_secs: u64) -> Self {
        self.short_timeout_secs = short_secs;
        self.long_timeout_secs = long_secs;
        self
    }

    pub fn short_timeout(&self) -> Duration {
        Duration::from_secs(self.short_timeout_secs)
    }

    pub fn long_timeout(&self) -> Duration {
        Duration::from_secs(self.long_timeout_secs)
    }

    /// Credential with all but the first two characters masked, for logs.
    pub fn masked_api_key(&self) -> String {
        let visible: String = self.api_key.chars().take(2).collect();
        let hidden = self.api_key.chars().count().saturating_sub(2);
        format!("{}{}", visible, "*".repeat(hidden))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(Error::Config(format!(
                "BACKEND_URL must start with http:// or https://, got: {}",
                self.base_url
            )));
        }
        if self.api_key.trim().is_empty() {
            return Err(Error::Config("WORKER_API_KEY cannot be empty".to_string()));
        }
        if self.short_timeout_secs == 0 || self.long_timeout_secs == 0 {
            return Err(Error::Config("HTTP timeouts must be positive".to_string()));
        }
        Ok(())
    }
}
