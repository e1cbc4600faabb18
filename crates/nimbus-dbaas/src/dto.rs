//! Wire representations of the managed database migration API.

use crate::models::{MigrationMethod, MigrationStatus};
use serde::{Deserialize, Serialize};

/// Body of `GET /dbaas-mysql/{name}/migration/status`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MigrationStatusDto {
    /// Overall migration state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<MigrationStatus>,
    /// Migration method.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<MigrationMethod>,
    /// Error reported by the migration, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Per-database progress.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<MigrationStatusDetailsDto>>,
}

/// Migration progress of one database.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MigrationStatusDetailsDto {
    /// Database name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dbname: Option<String>,
    /// Migration state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<MigrationStatus>,
    /// Migration method.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<MigrationMethod>,
    /// Error, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
