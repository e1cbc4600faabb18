//! Domain models for managed database migrations.

use crate::dto::{MigrationStatusDetailsDto, MigrationStatusDto};
use nimbus_core::string_enum;

string_enum! {
    /// State of a database migration.
    pub enum MigrationStatus {
        /// Copying data
        Running => "running",
        /// Replicating ongoing changes
        Syncing => "syncing",
        /// Stopped on an error
        Failed => "failed",
        /// Completed
        Done => "done",
    }
}

string_enum! {
    /// How data is moved to the managed database.
    pub enum MigrationMethod {
        /// One-off dump and restore
        Dump => "dump",
        /// Continuous replication
        Replication => "replication",
    }
}

/// Progress of a MySQL migration into a managed database service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseMigrationStatus {
    /// Overall state
    pub status: Option<MigrationStatus>,
    /// Migration method
    pub method: Option<MigrationMethod>,
    /// Error reported by the migration
    pub error: Option<String>,
    /// Per-database progress
    pub details: Vec<DatabaseMigrationStatusDetails>,
}

impl DatabaseMigrationStatus {
    /// Returns true once the migration can make no further progress on its own.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        matches!(
            self.status,
            Some(MigrationStatus::Done | MigrationStatus::Failed)
        )
    }
}

/// Migration progress of one database.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseMigrationStatusDetails {
    /// Database name
    pub database: Option<String>,
    /// State
    pub status: Option<MigrationStatus>,
    /// Method
    pub method: Option<MigrationMethod>,
    /// Error
    pub error: Option<String>,
}

impl From<MigrationStatusDto> for DatabaseMigrationStatus {
    fn from(dto: MigrationStatusDto) -> Self {
        Self {
            status: dto.status,
            method: dto.method,
            error: dto.error,
            details: dto
                .details
                .unwrap_or_default()
                .into_iter()
                .map(DatabaseMigrationStatusDetails::from)
                .collect(),
        }
    }
}

impl From<MigrationStatusDetailsDto> for DatabaseMigrationStatusDetails {
    fn from(dto: MigrationStatusDetailsDto) -> Self {
        Self {
            database: dto.dbname,
            status: dto.status,
            method: dto.method,
            error: dto.error,
        }
    }
}

impl From<&DatabaseMigrationStatusDetails> for MigrationStatusDetailsDto {
    fn from(details: &DatabaseMigrationStatusDetails) -> Self {
        Self {
            dbname: details.database.clone(),
            status: details.status.clone(),
            method: details.method.clone(),
            error: details.error.clone(),
        }
    }
}

impl From<&DatabaseMigrationStatus> for MigrationStatusDto {
    fn from(status: &DatabaseMigrationStatus) -> Self {
        Self {
            status: status.status.clone(),
            method: status.method.clone(),
            error: status.error.clone(),
            details: Some(
                status
                    .details
                    .iter()
                    .map(MigrationStatusDetailsDto::from)
                    .collect(),
            ),
        }
    }
}
