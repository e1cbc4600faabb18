//! HTTP transport contract.
//!
//! The SDK only ever talks to the API through [`Transport::execute`]: a method, a path
//! relative to the API endpoint, and an optional JSON body in; a status code and a raw
//! body out. Authentication, TLS and endpoint resolution belong to the transport.

use crate::client::{ClientConfig, DEFAULT_CONNECT_TIMEOUT};
use crate::config::NimbusConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::{Client, ClientBuilder, Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

const USER_AGENT: &str = concat!("nimbus-sdk/", env!("CARGO_PKG_VERSION"));

/// Raw response returned by a [`Transport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code
    pub status: StatusCode,
    /// Response body as text
    pub body: String,
}

impl TransportResponse {
    /// Create a response from a status code and body.
    #[must_use]
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Return the body of a 2xx response, or the status mapped to an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HttpStatus`] for any non-2xx status.
    pub fn into_success(self) -> Result<String> {
        if self.status.is_success() {
            Ok(self.body)
        } else {
            Err(map_status_to_error(self.status, self.body))
        }
    }
}

/// Narrow contract the SDK needs from an HTTP client.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue a request and return the raw response.
    ///
    /// # Arguments
    ///
    /// * `method` - HTTP verb
    /// * `path` - Path relative to the API endpoint (e.g. `load-balancer/{id}`)
    /// * `body` - Optional JSON request body
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] when no response could be obtained. Non-2xx
    /// responses are returned as `Ok` and interpreted by the caller.
    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<TransportResponse>;
}

/// Check that `value` can be used as a single path segment, such as the `{id}` in
/// `load-balancer/{id}`.
///
/// Paths are resolved against the endpoint with [`Url::join`], so a value holding a
/// separator, a query or fragment marker, a percent escape, or a dot segment would
/// address a different resource.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] naming `what` when the value is empty or would
/// not stay inside its segment.
pub fn path_segment<'a>(what: &str, value: &'a str) -> Result<&'a str> {
    if value.is_empty() {
        return Err(Error::InvalidArgument(format!("{what} is required")));
    }
    if value == "." || value == ".." {
        return Err(Error::InvalidArgument(format!(
            "{what} `{value}` is not a valid path segment"
        )));
    }
    if let Some(c) = value
        .chars()
        .find(|&c| matches!(c, '/' | '\\' | '?' | '#' | '%') || c.is_control())
    {
        return Err(Error::InvalidArgument(format!(
            "{what} `{}` must not contain {c:?}",
            value.escape_debug()
        )));
    }
    Ok(value)
}

fn map_status_to_error(status: StatusCode, text: String) -> Error {
    // The API wraps errors as `{"message": "..."}`; fall back to the raw body.
    let message = serde_json::from_str::<serde_json::Value>(&text)
        .ok()
        .and_then(|value| {
            value
                .get("message")
                .and_then(serde_json::Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or(text);

    let message = if message.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string()
    } else {
        message
    };

    Error::HttpStatus {
        status: status.as_u16(),
        message,
    }
}

/// Builder for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct HttpTransportBuilder {
    base_url: Url,
    http_config: ClientConfig,
    user_agent: String,
    headers: HeaderMap,
}

impl HttpTransportBuilder {
    /// Create a builder for the given API endpoint (e.g. `https://api.example.com/v2`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the URL cannot be parsed.
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        let mut url = Url::parse(base_url.as_ref()).map_err(|err| {
            Error::ConfigError(format!(
                "Invalid API endpoint `{}`: {err}",
                base_url.as_ref()
            ))
        })?;

        // `Url::join` replaces the last segment unless the base ends with a slash.
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }

        Ok(Self {
            base_url: url,
            http_config: ClientConfig::new(),
            user_agent: USER_AGENT.to_string(),
            headers: HeaderMap::new(),
        })
    }

    /// Create a builder from a validated [`NimbusConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint or the authorization value is invalid.
    pub fn from_config(config: &NimbusConfig) -> Result<Self> {
        let mut builder = Self::new(&config.endpoint)?.with_http_config(config.client_config());
        if let Some(authorization) = &config.authorization {
            builder = builder.with_authorization(authorization)?;
        }
        Ok(builder)
    }

    /// Override the HTTP client configuration.
    #[must_use]
    pub fn with_http_config(mut self, config: ClientConfig) -> Self {
        self.http_config = config;
        self
    }

    /// Override the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Add a header sent with every request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the name or value is not a valid header.
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|err| Error::ConfigError(format!("Invalid header name `{name}`: {err}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|err| Error::ConfigError(format!("Invalid value for header `{name}`: {err}")))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Set a pre-computed `Authorization` header value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the value is not a valid header value.
    pub fn with_authorization(mut self, authorization: &SecretString) -> Result<Self> {
        let mut value = HeaderValue::from_str(authorization.expose_secret())
            .map_err(|_| Error::ConfigError("Invalid authorization header value".to_string()))?;
        value.set_sensitive(true);
        self.headers.insert(AUTHORIZATION, value);
        Ok(self)
    }

    /// Build the transport.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the underlying HTTP client cannot be built.
    pub fn build(self) -> Result<HttpTransport> {
        let mut builder = ClientBuilder::new()
            .timeout(self.http_config.timeout)
            .user_agent(self.user_agent)
            .default_headers(self.headers)
            .pool_idle_timeout(self.http_config.pool_idle_timeout)
            .pool_max_idle_per_host(self.http_config.pool_max_idle_per_host)
            .connect_timeout(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT));

        if !self.http_config.enable_compression {
            builder = builder.no_gzip();
        }

        let http = builder
            .build()
            .map_err(|err| Error::ConfigError(format!("Failed to build HTTP client: {err}")))?;

        Ok(HttpTransport {
            http,
            base_url: self.base_url,
        })
    }
}

/// [`Transport`] backed by a pooled reqwest client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: Client,
    base_url: Url,
}

impl HttpTransport {
    /// Create a transport with default settings for the given endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the client cannot be built.
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        HttpTransportBuilder::new(base_url)?.build()
    }

    /// Access the API endpoint.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn build_url(&self, path: &str) -> Result<Url> {
        let normalized = path.strip_prefix('/').unwrap_or(path);

        self.base_url
            .join(normalized)
            .map_err(|err| Error::InvalidEndpoint(format!("Invalid API path `{path}`: {err}")))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<TransportResponse> {
        let url = self.build_url(path)?;
        let mut request = self
            .http
            .request(method.clone(), url)
            .header("Accept", "application/json");

        if let Some(payload) = &body {
            request = request.json(payload);
        }

        info!(%method, path, "API request");

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        debug!(%method, path, status = status.as_u16(), "API response");

        Ok(TransportResponse::new(status, text))
    }
}
