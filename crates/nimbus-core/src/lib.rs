//! # nimbus-core
//!
//! Core types and utilities shared by the Nimbus cloud SDK crates.
//!
//! Every mutating call against the cloud API is asynchronous on the server side: the
//! request returns an [`Operation`] handle which must be polled until it resolves. This
//! crate provides the pieces needed to drive that flow.
//!
//! ## Modules
//!
//! - [`error`] - Error taxonomy and HTTP status code mapping
//! - [`context`] - Per-call cancellation and deadline handling
//! - [`transport`] - The narrow HTTP transport contract and its reqwest implementation
//! - [`client`] - Client settings, poll backoff policy and the shared service client
//! - [`operation`] - Operation model and the operation poller
//! - [`config`] - Serializable, validated SDK configuration
//! - [`types`] - Forward-compatible string enums

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod operation;
pub mod transport;
pub mod types;

// Re-export commonly used types
pub use client::{ClientConfig, PollPolicy, ServiceClient};
pub use config::{NimbusConfig, PollConfig};
pub use context::CallContext;
pub use error::{Error, ErrorKind, Result};
pub use operation::{Operation, OperationPoller, OperationState, Reference};
pub use transport::{
    path_segment, HttpTransport, HttpTransportBuilder, Transport, TransportResponse,
};

#[doc(hidden)]
pub use serde as __serde;
