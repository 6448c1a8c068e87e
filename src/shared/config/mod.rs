//! Client configuration
//!
//! Settings for [`crate::client::api::BoardClient`]: where the server lives,
//! which bearer token to present, and how hard to retry contended writes.

use std::time::Duration;
use thiserror::Error;

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server base URL, without a trailing slash
    pub server_url: String,
    /// Bearer token sent with every request
    pub token: Option<String>,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Maximum retries for a contended write
    pub max_retries: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Upper bound on any single retry delay
    pub max_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:3000".to_string(),
            token: None,
            request_timeout: Duration::from_secs(10),
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl ClientConfig {
    /// Create a new ClientConfigBuilder
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.server_url.starts_with("http://") || self.server_url.starts_with("https://")) {
            return Err(ConfigError::InvalidUrl(self.server_url.clone()));
        }
        if self.base_delay > self.max_delay {
            return Err(ConfigError::InvalidValue(
                "base_delay",
                format!("{:?} exceeds max_delay {:?}", self.base_delay, self.max_delay),
            ));
        }
        Ok(())
    }

    /// Join a path onto the server URL
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.server_url, path)
    }
}

/// Builder for ClientConfig
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    server_url: Option<String>,
    token: Option<String>,
    request_timeout: Option<Duration>,
    max_retries: Option<u32>,
    base_delay: Option<Duration>,
    max_delay: Option<Duration>,
}

impl ClientConfigBuilder {
    /// Set the server URL
    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = Some(url.into());
        self
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = Some(delay);
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = Some(delay);
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<ClientConfig, ConfigError> {
        let defaults = ClientConfig::default();
        let config = ClientConfig {
            server_url: self
                .server_url
                .map(|url| url.trim_end_matches('/').to_string())
                .ok_or(ConfigError::MissingValue("server_url"))?,
            token: self.token,
            request_timeout: self.request_timeout.unwrap_or(defaults.request_timeout),
            max_retries: self.max_retries.unwrap_or(defaults.max_retries),
            base_delay: self.base_delay.unwrap_or(defaults.base_delay),
            max_delay: self.max_delay.unwrap_or(defaults.max_delay),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Configuration errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("missing value: {0}")]
    MissingValue(&'static str),
    #[error("invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
