//! Device-cloud configuration.
//!
//! One place for the credential set and call timeouts so the other crates
//! do not re-derive the same defaults and env-var names.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Environment variable names.
pub mod env_vars {
    pub const CLOUD_BASE_URL: &str = "CASALINK_CLOUD_BASE_URL";
    pub const CLOUD_CLIENT_ID: &str = "CASALINK_CLOUD_CLIENT_ID";
    pub const CLOUD_CLIENT_SECRET: &str = "CASALINK_CLOUD_CLIENT_SECRET";
}

/// Default timeouts for outbound device-cloud calls.
pub mod timeouts {
    use std::time::Duration;

    /// Token fetch and other auth/health calls.
    pub const AUTH: Duration = Duration::from_secs(5);
    /// Device list and batch status calls.
    pub const API: Duration = Duration::from_secs(15);
}

/// Configuration for the signed device-cloud client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudConfig {
    /// Base URL of the device-cloud, without a trailing slash.
    pub base_url: String,
    /// Client id issued by the device-cloud.
    pub client_id: String,
    /// Client secret used as the HMAC signing key.
    pub client_secret: String,
    /// Timeout for token/auth calls.
    #[serde(default = "default_auth_timeout")]
    pub auth_timeout: Duration,
    /// Timeout for list/batch/command calls.
    #[serde(default = "default_api_timeout")]
    pub api_timeout: Duration,
}

fn default_auth_timeout() -> Duration {
    timeouts::AUTH
}

fn default_api_timeout() -> Duration {
    timeouts::API
}

impl CloudConfig {
    /// Create a configuration from explicit values.
    pub fn new(
        base_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            auth_timeout: timeouts::AUTH,
            api_timeout: timeouts::API,
        }
    }

    /// Load the configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let read = |name: &str| {
            std::env::var(name)
                .map_err(|_| Error::Configuration(format!("missing env var {}", name)))
        };

        let config = Self::new(
            read(env_vars::CLOUD_BASE_URL)?,
            read(env_vars::CLOUD_CLIENT_ID)?,
            read(env_vars::CLOUD_CLIENT_SECRET)?,
        );
        config.validate()?;
        Ok(config)
    }

    /// Override the auth timeout.
    pub fn with_auth_timeout(mut self, timeout: Duration) -> Self {
        self.auth_timeout = timeout;
        self
    }

    /// Override the API timeout.
    pub fn with_api_timeout(mut self, timeout: Duration) -> Self {
        self.api_timeout = timeout;
        self
    }

    /// Check that every field required for signing is present.
    pub fn validate(&self) -> Result<()> {
        if self.base_url.is_empty() {
            return Err(Error::Configuration("empty base URL".to_string()));
        }
        if self.client_id.is_empty() {
            return Err(Error::Configuration("empty client id".to_string()));
        }
        if self.client_secret.is_empty() {
            return Err(Error::Configuration("empty client secret".to_string()));
        }
        Ok(())
    }
}
