//! Configuration structures for Nimbus clients.
//!
//! [`NimbusConfig`] is a serializable, validated description of how to reach the API
//! and how long to wait on operations. Locating and loading configuration files is
//! left to the application.

use crate::client::{
    ClientConfig, PollPolicy, DEFAULT_POLL_INTERVAL_MS, DEFAULT_POLL_MAX_INTERVAL_MS,
    DEFAULT_POLL_TIMEOUT_SECS, DEFAULT_REQUEST_TIMEOUT,
};
use crate::error::{Error, Result};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;
use validator::Validate;

/// Configuration for a Nimbus client instance.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NimbusConfig {
    /// API endpoint, already resolved for the target zone
    #[validate(url)]
    pub endpoint: String,

    /// Pre-computed `Authorization` header value
    #[serde(default, skip_serializing)]
    pub authorization: Option<SecretString>,

    /// Request timeout in seconds
    #[validate(range(min = 1, max = 300))]
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Operation polling settings
    #[validate(nested)]
    #[serde(default)]
    pub poll: PollConfig,
}

const fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT
}

impl NimbusConfig {
    /// Create a new configuration for the given endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or validation fails.
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let config = Self {
            endpoint: endpoint.into(),
            authorization: None,
            request_timeout_secs: default_request_timeout_secs(),
            poll: PollConfig::default(),
        };

        config.check()?;
        Ok(config)
    }

    /// Set the `Authorization` header value.
    #[must_use]
    pub fn with_authorization(mut self, authorization: impl Into<String>) -> Self {
        self.authorization = Some(SecretString::from(authorization.into()));
        self
    }

    /// Set request timeout in seconds.
    #[must_use]
    pub const fn with_timeout(mut self, seconds: u64) -> Self {
        self.request_timeout_secs = seconds;
        self
    }

    /// Set operation polling settings.
    #[must_use]
    pub const fn with_poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] describing every invalid field.
    pub fn check(&self) -> Result<()> {
        self.validate()
            .map_err(|e| Error::ConfigError(format!("Invalid configuration: {e}")))
    }

    /// Get the request timeout as a Duration.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Parse the endpoint URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed.
    pub fn parse_endpoint(&self) -> Result<Url> {
        Url::parse(&self.endpoint)
            .map_err(|e| Error::ConfigError(format!("Invalid endpoint URL: {e}")))
    }

    /// The poll policy described by this configuration.
    #[must_use]
    pub const fn poll_policy(&self) -> PollPolicy {
        self.poll.policy()
    }

    /// HTTP client settings derived from this configuration.
    #[must_use]
    pub const fn client_config(&self) -> ClientConfig {
        ClientConfig::new().with_timeout(self.timeout())
    }
}

/// Operation polling settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct PollConfig {
    /// Delay before the second poll, in milliseconds
    #[validate(range(min = 1, max = 60_000))]
    #[serde(default = "default_initial_interval_ms")]
    pub initial_interval_ms: u64,

    /// Cap on the delay between polls, in milliseconds
    #[validate(range(min = 1, max = 300_000))]
    #[serde(default = "default_max_interval_ms")]
    pub max_interval_ms: u64,

    /// Backoff multiplier
    #[validate(range(min = 1, max = 10))]
    #[serde(default = "default_multiplier")]
    pub multiplier: u32,

    /// Overall bound on waiting for one operation, in seconds
    #[validate(range(min = 1, max = 86_400))]
    #[serde(default = "default_poll_timeout_secs")]
    pub timeout_secs: u64,
}

const fn default_initial_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

const fn default_max_interval_ms() -> u64 {
    DEFAULT_POLL_MAX_INTERVAL_MS
}

const fn default_multiplier() -> u32 {
    2
}

const fn default_poll_timeout_secs() -> u64 {
    DEFAULT_POLL_TIMEOUT_SECS
}

impl PollConfig {
    /// Create polling settings with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            initial_interval_ms: default_initial_interval_ms(),
            max_interval_ms: default_max_interval_ms(),
            multiplier: default_multiplier(),
            timeout_secs: default_poll_timeout_secs(),
        }
    }

    /// Set the initial interval in milliseconds.
    #[must_use]
    pub const fn with_initial_interval(mut self, millis: u64) -> Self {
        self.initial_interval_ms = millis;
        self
    }

    /// Set the maximum interval in milliseconds.
    #[must_use]
    pub const fn with_max_interval(mut self, millis: u64) -> Self {
        self.max_interval_ms = millis;
        self
    }

    /// Set the backoff multiplier.
    #[must_use]
    pub const fn with_multiplier(mut self, multiplier: u32) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Set the overall timeout in seconds.
    #[must_use]
    pub const fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_secs = seconds;
        self
    }

    /// Convert to a [`PollPolicy`].
    #[must_use]
    pub const fn policy(&self) -> PollPolicy {
        PollPolicy::new()
            .with_initial_interval(Duration::from_millis(self.initial_interval_ms))
            .with_max_interval(Duration::from_millis(self.max_interval_ms))
            .with_multiplier(self.multiplier)
            .with_timeout(Some(Duration::from_secs(self.timeout_secs)))
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self::new()
    }
}
