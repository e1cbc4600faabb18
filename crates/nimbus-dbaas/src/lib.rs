//! Managed database (DBaaS) client for the Nimbus cloud SDK.
//!
//! Covers the MySQL migration endpoints: stopping a running migration and reading
//! its progress.

#![deny(missing_docs)]

pub mod client;
pub mod dto;
pub mod models;

pub use client::{DbaasClient, DbaasClientBuilder};
pub use models::{
    DatabaseMigrationStatus, DatabaseMigrationStatusDetails, MigrationMethod, MigrationStatus,
};

/// Convenient result alias that reuses the shared Nimbus error type.
pub type Result<T> = nimbus_core::Result<T>;
