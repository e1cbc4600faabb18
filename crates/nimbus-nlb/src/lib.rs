//! Network load balancer client and data models for the Nimbus cloud SDK.
//!
//! Every mutating call submits a request, waits for the resulting operation to
//! succeed, and returns the load balancer (or service) as re-read from the API.

#![deny(missing_docs)]

pub mod client;
pub mod dto;
mod mapper;
pub mod models;

pub use client::{NlbClient, NlbClientBuilder};
pub use models::{
    HealthcheckMode, LoadBalancerState, NetworkLoadBalancer, NetworkLoadBalancerServerStatus,
    NetworkLoadBalancerService, NetworkLoadBalancerServiceHealthcheck, ServerStatus,
    ServiceProtocol, ServiceState, ServiceStrategy,
};

/// Convenient result alias that reuses the shared Nimbus error type.
pub type Result<T> = nimbus_core::Result<T>;
