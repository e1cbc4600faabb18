//! Domain models for network load balancers.
//!
//! These are the types SDK consumers work with. Every server-populated field is an
//! `Option`, so a field the server did not return stays `None` instead of taking a
//! default value. Child collections are plain `Vec`s and are empty, never absent,
//! once the parent has been read from the API.

use chrono::{DateTime, Utc};
use nimbus_core::string_enum;
use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Duration;

string_enum! {
    /// Lifecycle state of a load balancer.
    pub enum LoadBalancerState {
        /// Being provisioned
        Creating => "creating",
        /// Being deleted
        Deleting => "deleting",
        /// Provisioning or an update failed
        Error => "error",
        /// Moved to another host
        Migrated => "migrated",
        /// Moving to another host
        Migrating => "migrating",
        /// Serving traffic
        Running => "running",
    }
}

string_enum! {
    /// Transport protocol balanced by a service.
    pub enum ServiceProtocol {
        /// TCP
        Tcp => "tcp",
        /// UDP
        Udp => "udp",
    }
}

string_enum! {
    /// Strategy used to pick a backend instance.
    pub enum ServiceStrategy {
        /// Rotate through instances
        RoundRobin => "round-robin",
        /// Hash of the client source address
        SourceHash => "source-hash",
        /// Consistent hashing
        MaglevHash => "maglev-hash",
    }
}

string_enum! {
    /// Lifecycle state of a load balancer service.
    pub enum ServiceState {
        /// Being provisioned
        Creating => "creating",
        /// Being deleted
        Deleting => "deleting",
        /// Provisioning or an update failed
        Error => "error",
        /// Serving traffic
        Running => "running",
        /// Applying an update
        Updating => "updating",
    }
}

string_enum! {
    /// Healthcheck type.
    pub enum HealthcheckMode {
        /// TCP connect
        Tcp => "tcp",
        /// HTTP request
        Http => "http",
        /// HTTPS request
        Https => "https",
    }
}

string_enum! {
    /// Result of the latest healthcheck against one backend.
    pub enum ServerStatus {
        /// Healthcheck failed
        Failure => "failure",
        /// Healthcheck succeeded
        Success => "success",
    }
}

/// A network load balancer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetworkLoadBalancer {
    /// Load balancer ID
    pub id: Option<String>,
    /// Name
    pub name: Option<String>,
    /// Description
    pub description: Option<String>,
    /// Creation time
    pub created_at: Option<DateTime<Utc>>,
    /// Public IP address
    pub ip_address: Option<IpAddr>,
    /// User labels
    pub labels: Option<HashMap<String, String>>,
    /// Services exposed by the load balancer
    pub services: Vec<NetworkLoadBalancerService>,
    /// Lifecycle state
    pub state: Option<LoadBalancerState>,
}

impl NetworkLoadBalancer {
    /// Describe a new load balancer to create.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Reference an existing load balancer by ID.
    #[must_use]
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// Set the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the labels.
    #[must_use]
    pub fn labels(mut self, labels: HashMap<String, String>) -> Self {
        self.labels = Some(labels);
        self
    }

    /// Look up a service by ID.
    #[must_use]
    pub fn service(&self, id: &str) -> Option<&NetworkLoadBalancerService> {
        self.services
            .iter()
            .find(|service| service.id.as_deref() == Some(id))
    }
}

/// A service (listener) of a network load balancer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetworkLoadBalancerService {
    /// Service ID
    pub id: Option<String>,
    /// Name, unique within the load balancer
    pub name: Option<String>,
    /// Description
    pub description: Option<String>,
    /// Instance pool receiving the traffic
    pub instance_pool_id: Option<String>,
    /// Port exposed on the load balancer IP
    pub port: Option<u16>,
    /// Port traffic is forwarded to on instances
    pub target_port: Option<u16>,
    /// Balanced protocol
    pub protocol: Option<ServiceProtocol>,
    /// Balancing strategy
    pub strategy: Option<ServiceStrategy>,
    /// Lifecycle state
    pub state: Option<ServiceState>,
    /// Healthcheck settings
    pub healthcheck: Option<NetworkLoadBalancerServiceHealthcheck>,
    /// Latest healthcheck result per backend
    pub healthcheck_status: Vec<NetworkLoadBalancerServerStatus>,
}

/// Healthcheck settings of a load balancer service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkLoadBalancerServiceHealthcheck {
    /// Check type
    pub mode: Option<HealthcheckMode>,
    /// Checked port
    pub port: Option<u16>,
    /// Time between checks (whole seconds on the wire)
    pub interval: Option<Duration>,
    /// Check timeout (whole seconds on the wire)
    pub timeout: Option<Duration>,
    /// Failed checks before a backend is marked down
    pub retries: Option<i64>,
    /// Request URI for HTTP(S) checks
    pub uri: Option<String>,
    /// SNI sent by HTTPS checks
    pub tls_sni: Option<String>,
}

/// Healthcheck result for one backend instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkLoadBalancerServerStatus {
    /// Backend instance public IP
    pub instance_ip: Option<IpAddr>,
    /// Check result
    pub status: Option<ServerStatus>,
}
