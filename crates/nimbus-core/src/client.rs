//! HTTP client settings, poll backoff and the shared service client.
//!
//! [`ServiceClient`] is the building block every resource client wraps: it sends JSON
//! requests through a [`Transport`], decodes responses, and for mutating calls drives
//! the returned operation to completion with an [`OperationPoller`].

use crate::config::NimbusConfig;
use crate::context::CallContext;
use crate::error::{Error, Result};
use crate::operation::{Operation, OperationPoller};
use crate::transport::{HttpTransportBuilder, Transport};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Default timeout for a single API request, in seconds
pub const DEFAULT_REQUEST_TIMEOUT: u64 = 30;

/// Default TCP connect timeout, in seconds
pub const DEFAULT_CONNECT_TIMEOUT: u64 = 10;

// Connection pool settings

/// Default idle timeout for connection pools
pub const DEFAULT_POOL_IDLE_TIMEOUT: u64 = 90;

/// Default maximum idle connections per host
pub const DEFAULT_POOL_MAX_IDLE_PER_HOST: usize = 10;

// Operation polling settings

/// Default delay before the second poll, in milliseconds
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Default cap on the delay between polls, in milliseconds
pub const DEFAULT_POLL_MAX_INTERVAL_MS: u64 = 5000;

/// Default upper bound on the time spent waiting for one operation, in seconds
pub const DEFAULT_POLL_TIMEOUT_SECS: u64 = 600;

/// Shortest delay between two polls of the same operation
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Backoff policy for operation polling.
///
/// The first poll happens immediately; subsequent polls wait
/// `initial_interval * multiplier^(n-1)`, capped at `max_interval` and never shorter
/// than [`MIN_POLL_INTERVAL`]. A multiplier of 0 behaves like 1. Polling is
/// additionally bounded by `timeout` and by the caller's [`CallContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay before the second poll
    pub initial_interval: Duration,

    /// Maximum delay between polls (cap for exponential backoff)
    pub max_interval: Duration,

    /// Backoff multiplier (1 for a fixed interval)
    pub multiplier: u32,

    /// Overall bound on waiting for one operation
    pub timeout: Option<Duration>,
}

impl PollPolicy {
    /// Create a poll policy with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            initial_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            max_interval: Duration::from_millis(DEFAULT_POLL_MAX_INTERVAL_MS),
            multiplier: 2,
            timeout: Some(Duration::from_secs(DEFAULT_POLL_TIMEOUT_SECS)),
        }
    }

    /// Create a policy polling at a fixed interval.
    #[must_use]
    pub const fn fixed(interval: Duration) -> Self {
        Self {
            initial_interval: interval,
            max_interval: interval,
            multiplier: 1,
            timeout: Some(Duration::from_secs(DEFAULT_POLL_TIMEOUT_SECS)),
        }
    }

    /// Set the initial interval.
    #[must_use]
    pub const fn with_initial_interval(mut self, interval: Duration) -> Self {
        self.initial_interval = interval;
        self
    }

    /// Set the maximum interval.
    #[must_use]
    pub const fn with_max_interval(mut self, interval: Duration) -> Self {
        self.max_interval = interval;
        self
    }

    /// Set the backoff multiplier.
    #[must_use]
    pub const fn with_multiplier(mut self, multiplier: u32) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Set the overall timeout. `None` leaves the bound to the caller's context.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Calculate the delay before a given poll attempt.
    ///
    /// Uses exponential backoff: delay = min(initial_interval * multiplier^(attempt-1), max_interval),
    /// raised to at least [`MIN_POLL_INTERVAL`] for every attempt after the first.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::from_secs(0);
        }

        let multiplier = self.multiplier.max(1).saturating_pow(attempt - 1);
        let delay = self.initial_interval.saturating_mul(multiplier);

        std::cmp::min(delay, self.max_interval).max(MIN_POLL_INTERVAL)
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::new()
    }
}

/// HTTP client configuration.
///
/// Configures HTTP client behavior including timeouts and connection pooling. Operation
/// polling is configured separately with a [`PollPolicy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Request timeout
    pub timeout: Duration,

    /// Connection pool idle timeout
    pub pool_idle_timeout: Duration,

    /// Maximum idle connections per host
    pub pool_max_idle_per_host: usize,

    /// Enable response compression
    pub enable_compression: bool,
}

impl ClientConfig {
    /// Create a new client configuration with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT),
            pool_idle_timeout: Duration::from_secs(DEFAULT_POOL_IDLE_TIMEOUT),
            pool_max_idle_per_host: DEFAULT_POOL_MAX_IDLE_PER_HOST,
            enable_compression: true,
        }
    }

    /// Set request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set connection pool idle timeout.
    #[must_use]
    pub const fn with_pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool_idle_timeout = timeout;
        self
    }

    /// Set maximum idle connections per host.
    #[must_use]
    pub const fn with_pool_max_idle(mut self, max: usize) -> Self {
        self.pool_max_idle_per_host = max;
        self
    }

    /// Enable or disable compression.
    #[must_use]
    pub const fn with_compression(mut self, enabled: bool) -> Self {
        self.enable_compression = enabled;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared request and operation plumbing for resource clients.
#[derive(Clone)]
pub struct ServiceClient {
    transport: Arc<dyn Transport>,
    poll_policy: PollPolicy,
}

impl ServiceClient {
    /// Wrap a transport using the default poll policy.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            poll_policy: PollPolicy::new(),
        }
    }

    /// Build an HTTP-backed client from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client cannot be built.
    pub fn from_config(config: &NimbusConfig) -> Result<Self> {
        config.check()?;
        let transport = HttpTransportBuilder::from_config(config)?.build()?;
        Ok(Self::new(Arc::new(transport)).with_poll_policy(config.poll_policy()))
    }

    /// Override the poll policy.
    #[must_use]
    pub fn with_poll_policy(mut self, policy: PollPolicy) -> Self {
        self.poll_policy = policy;
        self
    }

    /// The poll policy applied to operations.
    #[must_use]
    pub const fn poll_policy(&self) -> &PollPolicy {
        &self.poll_policy
    }

    /// A poller sharing this client's transport and poll policy.
    #[must_use]
    pub fn poller(&self) -> OperationPoller {
        OperationPoller::new(Arc::clone(&self.transport), self.poll_policy)
    }

    /// Send a GET request and decode the JSON response.
    ///
    /// # Errors
    ///
    /// Returns a transport, protocol or cancellation error.
    pub async fn get_json<T>(&self, ctx: &CallContext, path: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.send_json::<(), T>(ctx, Method::GET, path, None).await
    }

    /// Send a request with an optional JSON body and decode the JSON response.
    ///
    /// # Errors
    ///
    /// Returns a transport, protocol or cancellation error.
    pub async fn send_json<B, R>(
        &self,
        ctx: &CallContext,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let text = self.send(ctx, method, path, body).await?;

        serde_json::from_str::<R>(&text).map_err(|err| {
            Error::Protocol(format!("Failed to parse API response for `{path}`: {err}"))
        })
    }

    /// Submit a mutating request and wait for the resulting operation to succeed.
    ///
    /// The returned operation is in the `success` state; callers use its
    /// [`reference`](Operation::reference) to re-fetch the affected resource.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] when the response carries no operation,
    /// [`Error::OperationFailed`] when the operation fails, and transport or
    /// cancellation errors unchanged.
    pub async fn submit<B>(
        &self,
        ctx: &CallContext,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Operation>
    where
        B: Serialize + ?Sized,
    {
        let text = self.send(ctx, method.clone(), path, body).await?;

        let operation = serde_json::from_str::<Operation>(&text).map_err(|err| {
            Error::Protocol(format!(
                "Response to {method} `{path}` did not contain an operation: {err}"
            ))
        })?;
        if operation.id.is_empty() {
            return Err(Error::Protocol(format!(
                "Response to {method} `{path}` carried an empty operation id"
            )));
        }

        info!(%method, path, operation_id = %operation.id, "Awaiting operation");

        self.poller().await_operation(ctx, &operation.id).await
    }

    async fn send<B>(
        &self,
        ctx: &CallContext,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<String>
    where
        B: Serialize + ?Sized,
    {
        let payload = body.map(serde_json::to_value).transpose().map_err(|err| {
            Error::InvalidArgument(format!("Failed to encode request for `{path}`: {err}"))
        })?;

        ctx.run(self.transport.execute(method, path, payload))
            .await?
            .into_success()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::OperationState;
    use crate::transport::{MockTransport, TransportResponse};
    use reqwest::StatusCode;
    use serde_json::json;

    fn fast_policy() -> PollPolicy {
        PollPolicy::fixed(Duration::from_millis(1))
    }

    #[test]
    fn test_poll_policy_new() {
        let policy = PollPolicy::new();
        assert_eq!(
            policy.initial_interval,
            Duration::from_millis(DEFAULT_POLL_INTERVAL_MS)
        );
        assert_eq!(
            policy.max_interval,
            Duration::from_millis(DEFAULT_POLL_MAX_INTERVAL_MS)
        );
        assert_eq!(policy.multiplier, 2);
        assert_eq!(
            policy.timeout,
            Some(Duration::from_secs(DEFAULT_POLL_TIMEOUT_SECS))
        );
    }

    #[test]
    fn test_poll_policy_delay_calculation() {
        let policy = PollPolicy::new();

        // First poll is immediate
        assert_eq!(policy.delay_for_attempt(0), Duration::from_secs(0));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(1000));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(2000));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(4000));

        // Capped at max_interval
        assert_eq!(policy.delay_for_attempt(5), Duration::from_millis(5000));
        assert_eq!(policy.delay_for_attempt(60), Duration::from_millis(5000));
    }

    #[test]
    fn test_poll_policy_never_spins() {
        let zero = PollPolicy::fixed(Duration::ZERO);
        assert_eq!(zero.delay_for_attempt(0), Duration::ZERO);
        assert_eq!(zero.delay_for_attempt(1), MIN_POLL_INTERVAL);
        assert_eq!(zero.delay_for_attempt(7), MIN_POLL_INTERVAL);

        let stalled = PollPolicy::new().with_multiplier(0);
        assert_eq!(stalled.delay_for_attempt(1), Duration::from_millis(500));
        assert_eq!(stalled.delay_for_attempt(2), Duration::from_millis(500));
        assert_eq!(stalled.delay_for_attempt(30), Duration::from_millis(500));

        let capped_at_zero = PollPolicy::new().with_max_interval(Duration::ZERO);
        assert_eq!(capped_at_zero.delay_for_attempt(3), MIN_POLL_INTERVAL);
    }

    #[test]
    fn test_poll_policy_fixed() {
        let policy = PollPolicy::fixed(Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(9), Duration::from_secs(2));
    }

    #[test]
    fn test_poll_policy_builder() {
        let policy = PollPolicy::new()
            .with_initial_interval(Duration::from_millis(100))
            .with_max_interval(Duration::from_secs(10))
            .with_multiplier(3)
            .with_timeout(None);

        assert_eq!(policy.initial_interval, Duration::from_millis(100));
        assert_eq!(policy.max_interval, Duration::from_secs(10));
        assert_eq!(policy.multiplier, 3);
        assert_eq!(policy.timeout, None);
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(900));
    }

    #[test]
    fn test_client_config_builder() {
        let config = ClientConfig::new()
            .with_timeout(Duration::from_secs(60))
            .with_pool_idle_timeout(Duration::from_secs(120))
            .with_pool_max_idle(20)
            .with_compression(false);

        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.pool_idle_timeout, Duration::from_secs(120));
        assert_eq!(config.pool_max_idle_per_host, 20);
        assert!(!config.enable_compression);
    }

    #[test]
    fn test_client_config_default() {
        let config = ClientConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_REQUEST_TIMEOUT));
        assert_eq!(config.pool_max_idle_per_host, DEFAULT_POOL_MAX_IDLE_PER_HOST);
        assert!(config.enable_compression);
    }

    #[tokio::test]
    async fn submit_polls_returned_operation() {
        let mut transport = MockTransport::new();
        transport
            .expect_execute()
            .withf(|method, path, body| {
                *method == Method::POST
                    && path == "load-balancer"
                    && body.as_ref() == Some(&json!({"name": "lb"}))
            })
            .times(1)
            .returning(|_, _, _| {
                Ok(TransportResponse::new(
                    StatusCode::OK,
                    json!({"id": "op-1", "state": "pending"}).to_string(),
                ))
            });
        transport
            .expect_execute()
            .withf(|method, path, body| {
                *method == Method::GET && path == "operation/op-1" && body.is_none()
            })
            .times(1)
            .returning(|_, _, _| {
                Ok(TransportResponse::new(
                    StatusCode::OK,
                    json!({"id": "op-1", "state": "success", "reference": {"id": "lb-1"}})
                        .to_string(),
                ))
            });

        let client = ServiceClient::new(Arc::new(transport)).with_poll_policy(fast_policy());
        let operation = client
            .submit(
                &CallContext::new(),
                Method::POST,
                "load-balancer",
                Some(&json!({"name": "lb"})),
            )
            .await
            .unwrap();

        assert_eq!(operation.state, Some(OperationState::Success));
        assert_eq!(operation.reference_key().unwrap(), "lb-1");
    }

    #[tokio::test]
    async fn submit_without_operation_is_protocol_error() {
        let mut transport = MockTransport::new();
        transport
            .expect_execute()
            .times(1)
            .returning(|_, _, _| Ok(TransportResponse::new(StatusCode::OK, "{}")));

        let client = ServiceClient::new(Arc::new(transport));
        let err = client
            .submit::<()>(&CallContext::new(), Method::DELETE, "load-balancer/x", None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[tokio::test]
    async fn submit_with_empty_operation_id_is_protocol_error() {
        let mut transport = MockTransport::new();
        transport.expect_execute().times(1).returning(|_, _, _| {
            Ok(TransportResponse::new(
                StatusCode::OK,
                r#"{"id":"","state":"pending"}"#,
            ))
        });

        let client = ServiceClient::new(Arc::new(transport));
        let err = client
            .submit::<()>(&CallContext::new(), Method::DELETE, "load-balancer/x", None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[tokio::test]
    async fn send_json_maps_error_status() {
        let mut transport = MockTransport::new();
        transport.expect_execute().times(1).returning(|_, _, _| {
            Ok(TransportResponse::new(
                StatusCode::FORBIDDEN,
                r#"{"message":"denied"}"#,
            ))
        });

        let client = ServiceClient::new(Arc::new(transport));
        let err = client
            .get_json::<serde_json::Value>(&CallContext::new(), "load-balancer")
            .await
            .unwrap_err();
        assert_eq!(
            err,
            Error::HttpStatus {
                status: 403,
                message: "denied".to_string()
            }
        );
    }

    #[tokio::test]
    async fn cancelled_context_sends_nothing() {
        // No expectations: any call on the mock panics.
        let transport = MockTransport::new();
        let client = ServiceClient::new(Arc::new(transport));

        let ctx = CallContext::new();
        ctx.cancel();
        let err = client
            .get_json::<serde_json::Value>(&ctx, "load-balancer")
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }
}
