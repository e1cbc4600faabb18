//! Asynchronous managed database client.

use crate::dto::MigrationStatusDto;
use crate::models::DatabaseMigrationStatus;
use crate::Result;
use nimbus_core::{
    path_segment, CallContext, ClientConfig, HttpTransportBuilder, NimbusConfig, PollPolicy,
    ServiceClient,
};
use reqwest::Method;
use secrecy::SecretString;
use std::sync::Arc;
use tracing::info;

const USER_AGENT: &str = concat!("nimbus-dbaas/", env!("CARGO_PKG_VERSION"));

/// Builder for [`DbaasClient`].
#[derive(Debug, Clone)]
pub struct DbaasClientBuilder {
    transport: HttpTransportBuilder,
    poll_policy: PollPolicy,
}

impl DbaasClientBuilder {
    /// Create a builder for the specified API endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed.
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        Ok(Self {
            transport: HttpTransportBuilder::new(base_url)?.with_user_agent(USER_AGENT),
            poll_policy: PollPolicy::new(),
        })
    }

    /// Create a builder from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn from_config(config: &NimbusConfig) -> Result<Self> {
        config.check()?;
        Ok(Self {
            transport: HttpTransportBuilder::from_config(config)?.with_user_agent(USER_AGENT),
            poll_policy: config.poll_policy(),
        })
    }

    /// Override the operation poll policy.
    #[must_use]
    pub fn with_poll_policy(mut self, policy: PollPolicy) -> Self {
        self.poll_policy = policy;
        self
    }

    /// Override the HTTP client configuration.
    #[must_use]
    pub fn with_http_config(mut self, config: ClientConfig) -> Self {
        self.transport = self.transport.with_http_config(config);
        self
    }

    /// Set a pre-computed `Authorization` header value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not a valid header value.
    pub fn with_authorization(mut self, authorization: impl Into<String>) -> Result<Self> {
        let secret = SecretString::from(authorization.into());
        self.transport = self.transport.with_authorization(&secret)?;
        Ok(self)
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn build(self) -> Result<DbaasClient> {
        let transport = self.transport.build()?;
        Ok(DbaasClient {
            inner: ServiceClient::new(Arc::new(transport)).with_poll_policy(self.poll_policy),
        })
    }
}

/// Asynchronous managed database client.
#[derive(Clone)]
pub struct DbaasClient {
    inner: ServiceClient,
}

impl DbaasClient {
    /// Construct a client with default settings for the given endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the HTTP client cannot be built.
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        DbaasClientBuilder::new(base_url)?.build()
    }

    /// Construct a client from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client cannot be built.
    pub fn from_config(config: &NimbusConfig) -> Result<Self> {
        DbaasClientBuilder::from_config(config)?.build()
    }

    /// Wrap an existing service client, e.g. one over a custom transport.
    #[must_use]
    pub const fn from_service_client(inner: ServiceClient) -> Self {
        Self { inner }
    }

    /// Stop the running migration of a MySQL database service.
    ///
    /// Returns once the stop operation has succeeded.
    ///
    /// # Errors
    ///
    /// Returns [`nimbus_core::Error::InvalidArgument`] without contacting the API when
    /// the name is empty or not a single path segment, and
    /// [`nimbus_core::Error::OperationFailed`] when the API reports the stop failed.
    pub async fn stop_mysql_migration(&self, ctx: &CallContext, name: &str) -> Result<()> {
        let path = format!("dbaas-mysql/{}/migration/stop", validate_name(name)?);
        let operation = self
            .inner
            .submit::<()>(ctx, Method::POST, &path, None)
            .await?;

        // The operation references the service by name.
        let service = operation.reference_key().unwrap_or(name);
        info!(service, operation_id = %operation.id, "MySQL migration stopped");

        Ok(())
    }

    /// Fetch the migration progress of a MySQL database service.
    ///
    /// # Errors
    ///
    /// Returns [`nimbus_core::Error::InvalidArgument`] for a name that is empty or not a
    /// single path segment, and transport, protocol or cancellation errors otherwise.
    pub async fn get_mysql_migration_status(
        &self,
        ctx: &CallContext,
        name: &str,
    ) -> Result<DatabaseMigrationStatus> {
        let path = format!("dbaas-mysql/{}/migration/status", validate_name(name)?);
        let dto: MigrationStatusDto = self.inner.get_json(ctx, &path).await?;
        Ok(DatabaseMigrationStatus::from(dto))
    }
}

fn validate_name(name: &str) -> Result<&str> {
    path_segment("database service name", name)
}
