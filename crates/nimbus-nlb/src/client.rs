//! Asynchronous network load balancer client.

use crate::dto::{ListLoadBalancersResponse, LoadBalancerDto};
use crate::mapper::{
    add_service_request, create_load_balancer_request, load_balancer_id, service_id,
    update_load_balancer_request, update_service_request,
};
use crate::models::{NetworkLoadBalancer, NetworkLoadBalancerService};
use crate::Result;
use nimbus_core::{
    path_segment, CallContext, ClientConfig, Error, HttpTransportBuilder, NimbusConfig,
    Operation, PollPolicy, ServiceClient,
};
use reqwest::Method;
use secrecy::SecretString;
use std::sync::Arc;
use tracing::{debug, info};

const USER_AGENT: &str = concat!("nimbus-nlb/", env!("CARGO_PKG_VERSION"));

/// Builder for [`NlbClient`].
#[derive(Debug, Clone)]
pub struct NlbClientBuilder {
    transport: HttpTransportBuilder,
    poll_policy: PollPolicy,
}

impl NlbClientBuilder {
    /// Create a builder for the specified API endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed.
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        let transport = HttpTransportBuilder::new(base_url)?.with_user_agent(USER_AGENT);

        Ok(Self {
            transport,
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
        let transport = HttpTransportBuilder::from_config(config)?.with_user_agent(USER_AGENT);

        Ok(Self {
            transport,
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
    pub fn build(self) -> Result<NlbClient> {
        let transport = self.transport.build()?;
        let inner = ServiceClient::new(Arc::new(transport)).with_poll_policy(self.poll_policy);
        Ok(NlbClient { inner })
    }
}

/// Asynchronous network load balancer client.
#[derive(Clone)]
pub struct NlbClient {
    inner: ServiceClient,
}

impl NlbClient {
    /// Construct a client with default settings for the given endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the HTTP client cannot be built.
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        NlbClientBuilder::new(base_url)?.build()
    }

    /// Construct a client from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client cannot be built.
    pub fn from_config(config: &NimbusConfig) -> Result<Self> {
        NlbClientBuilder::from_config(config)?.build()
    }

    /// Wrap an existing service client, e.g. one over a custom transport.
    #[must_use]
    pub const fn from_service_client(inner: ServiceClient) -> Self {
        Self { inner }
    }

    /// List the load balancers of the zone.
    ///
    /// # Errors
    ///
    /// Returns a transport, protocol or cancellation error.
    pub async fn list_load_balancers(&self, ctx: &CallContext) -> Result<Vec<NetworkLoadBalancer>> {
        let response: ListLoadBalancersResponse =
            self.inner.get_json(ctx, "load-balancer").await?;

        response
            .load_balancers
            .unwrap_or_default()
            .into_iter()
            .map(NetworkLoadBalancer::try_from)
            .collect()
    }

    /// Fetch a load balancer by ID.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for an ID that is empty or not a single path
    /// segment, and transport (including HTTP 404), protocol or cancellation errors
    /// otherwise.
    pub async fn get_load_balancer(&self, ctx: &CallContext, id: &str) -> Result<NetworkLoadBalancer> {
        let path = format!("load-balancer/{}", path_segment("load balancer id", id)?);
        let dto: LoadBalancerDto = self.inner.get_json(ctx, &path).await?;
        NetworkLoadBalancer::try_from(dto)
    }

    /// Find a load balancer by ID or name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when no load balancer matches.
    pub async fn find_load_balancer(
        &self,
        ctx: &CallContext,
        id_or_name: &str,
    ) -> Result<NetworkLoadBalancer> {
        let load_balancers = self.list_load_balancers(ctx).await?;

        let found = load_balancers
            .iter()
            .find(|lb| lb.id.as_deref() == Some(id_or_name))
            .or_else(|| {
                load_balancers
                    .iter()
                    .find(|lb| lb.name.as_deref() == Some(id_or_name))
            })
            .ok_or_else(|| Error::NotFound(format!("load balancer `{id_or_name}`")))?;

        let id = found.id.as_deref().ok_or_else(|| {
            Error::Protocol(format!("load balancer `{id_or_name}` was listed without an id"))
        })?;
        self.get_load_balancer(ctx, id).await
    }

    /// Create a load balancer and return it as stored by the API.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] when the name is missing, and otherwise any
    /// error from submitting the request, waiting for the operation, or re-reading
    /// the load balancer.
    pub async fn create_load_balancer(
        &self,
        ctx: &CallContext,
        load_balancer: &NetworkLoadBalancer,
    ) -> Result<NetworkLoadBalancer> {
        let request = create_load_balancer_request(load_balancer)?;

        let operation = self
            .inner
            .submit(ctx, Method::POST, "load-balancer", Some(&request))
            .await?;
        let id = operation.reference_key()?;
        info!(load_balancer_id = id, "Load balancer created");

        self.get_load_balancer(ctx, id).await
    }

    /// Update the name, description and labels of a load balancer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] without contacting the API when the ID is
    /// missing or not a single path segment.
    pub async fn update_load_balancer(
        &self,
        ctx: &CallContext,
        load_balancer: &NetworkLoadBalancer,
    ) -> Result<NetworkLoadBalancer> {
        let id = load_balancer_id(load_balancer)?;
        let request = update_load_balancer_request(load_balancer);

        let path = format!("load-balancer/{id}");
        let operation = self
            .inner
            .submit(ctx, Method::PUT, &path, Some(&request))
            .await?;
        let id = operation.reference_key()?;
        info!(load_balancer_id = id, "Load balancer updated");

        self.get_load_balancer(ctx, id).await
    }

    /// Delete a load balancer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] without contacting the API when the ID is
    /// missing or not a single path segment.
    pub async fn delete_load_balancer(
        &self,
        ctx: &CallContext,
        load_balancer: &NetworkLoadBalancer,
    ) -> Result<()> {
        let id = load_balancer_id(load_balancer)?;

        let path = format!("load-balancer/{id}");
        self.inner
            .submit::<()>(ctx, Method::DELETE, &path, None)
            .await?;
        info!(load_balancer_id = id, "Load balancer deleted");

        Ok(())
    }

    /// Add a service to a load balancer and return it as stored by the API.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] when the load balancer ID or a required
    /// service field is missing or malformed, and [`Error::NotFound`] when the new service cannot
    /// be located in the refreshed load balancer.
    pub async fn create_service(
        &self,
        ctx: &CallContext,
        load_balancer: &NetworkLoadBalancer,
        service: &NetworkLoadBalancerService,
    ) -> Result<NetworkLoadBalancerService> {
        let id = load_balancer_id(load_balancer)?;
        let request = add_service_request(service)?;

        let path = format!("load-balancer/{id}/service");
        let operation = self
            .inner
            .submit(ctx, Method::POST, &path, Some(&request))
            .await?;

        let parent = self.get_load_balancer(ctx, id).await?;
        locate_service(parent, &operation, None, Some(request.name.as_str()))
    }

    /// Update a load balancer service and return it as stored by the API.
    ///
    /// Only the fields set on `service` are sent; an explicitly empty value (for
    /// example an empty healthcheck URI) is sent as such.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] without contacting the API when either ID is
    /// missing or not a single path segment.
    pub async fn update_service(
        &self,
        ctx: &CallContext,
        load_balancer: &NetworkLoadBalancer,
        service: &NetworkLoadBalancerService,
    ) -> Result<NetworkLoadBalancerService> {
        let id = load_balancer_id(load_balancer)?;
        let sid = service_id(service)?;
        let request = update_service_request(service)?;

        let path = format!("load-balancer/{id}/service/{sid}");
        let operation = self
            .inner
            .submit(ctx, Method::PUT, &path, Some(&request))
            .await?;

        let parent = self.get_load_balancer(ctx, id).await?;
        locate_service(parent, &operation, Some(sid), service.name.as_deref())
    }

    /// Remove a service from a load balancer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] without contacting the API when either ID is
    /// missing or not a single path segment.
    pub async fn delete_service(
        &self,
        ctx: &CallContext,
        load_balancer: &NetworkLoadBalancer,
        service: &NetworkLoadBalancerService,
    ) -> Result<()> {
        let id = load_balancer_id(load_balancer)?;
        let sid = service_id(service)?;

        let path = format!("load-balancer/{id}/service/{sid}");
        self.inner
            .submit::<()>(ctx, Method::DELETE, &path, None)
            .await?;
        info!(load_balancer_id = id, service_id = sid, "Load balancer service deleted");

        Ok(())
    }
}

// Service operations reference the parent load balancer, so the child is matched on
// its own identifier (or its unique name), never on its position in the list.
fn locate_service(
    parent: NetworkLoadBalancer,
    operation: &Operation,
    requested_id: Option<&str>,
    name: Option<&str>,
) -> Result<NetworkLoadBalancerService> {
    let reference_id = operation
        .reference
        .as_ref()
        .and_then(|reference| reference.id.as_deref())
        .filter(|id| !id.is_empty() && Some(*id) != parent.id.as_deref());

    let parent_id = parent.id.clone().unwrap_or_default();
    let mut services = parent.services;

    if let Some(sid) = reference_id.or(requested_id) {
        debug!(load_balancer_id = %parent_id, service_id = sid, "Locating service by id");
        return services
            .into_iter()
            .find(|service| service.id.as_deref() == Some(sid))
            .ok_or_else(|| {
                Error::NotFound(format!("service {sid} of load balancer {parent_id}"))
            });
    }

    let Some(name) = name else {
        return Err(Error::NotFound(format!(
            "unidentified service of load balancer {parent_id}"
        )));
    };

    services.retain(|service| service.name.as_deref() == Some(name));
    match services.len() {
        0 => Err(Error::NotFound(format!(
            "service `{name}` of load balancer {parent_id}"
        ))),
        1 => Ok(services.remove(0)),
        count => Err(Error::Protocol(format!(
            "{count} services named `{name}` on load balancer {parent_id}"
        ))),
    }
}
