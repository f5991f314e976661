//! # MongoDB Migrator
//!
//! Versioned, inventory-registered migrations for services that own MongoDB
//! collections, plus the create-or-`collMod` helper used to keep collection
//! validators in sync with the service's declared schema.
//!
//! A service declares each migration in its own module and registers it with
//! [`register_migration!`]; [`create_migration_registry`] collects everything
//! linked into the binary.
//!
//! ```rust,ignore
//! use mongodb_migrator::{Migration, register_migration};
//! use async_trait::async_trait;
//! use mongodb::Database;
//! use anyhow::Result;
//!
//! #[derive(Default)]
//! pub struct CreateProductIndexes;
//!
//! register_migration!(CreateProductIndexes);
//!
//! #[async_trait]
//! impl Migration for CreateProductIndexes {
//!     fn version(&self) -> u32 { 1 }
//!     fn description(&self) -> &str { "Create product indexes" }
//!
//!     async fn up(&self, db: &Database) -> Result<()> { Ok(()) }
//!     async fn down(&self, db: &Database) -> Result<()> { Ok(()) }
//! }
//! ```

pub mod factory;
pub mod migration;
pub mod registry;
pub mod runner;
pub mod validator;
pub mod version;

#[cfg(feature = "cli")]
pub mod cli;

pub use factory::{create_migration_registry, MigrationRegistration};
pub use migration::{Migration, MigrationOptions, MigrationResult, MigrationStatus};
pub use registry::{MigrationInfo, MigrationPlan, MigrationRegistry, PlanType};
pub use runner::{MigrationRunner, MigrationRunnerStatus};
pub use validator::{apply_validator, ValidatorOutcome};
pub use version::{MigrationStats, MigrationVersion, VersionTracker};

#[cfg(feature = "cli")]
pub use cli::{MigrationCliRunner, MigrationCommand, ServiceConfig};

// Re-export inventory for the macro
pub use inventory;

/// Configuration for the migration system
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Collection holding one version record per applied migration
    pub version_collection: String,
    /// Service name, stored on every version record
    pub service_name: String,
    /// Default timeout for a single migration step
    pub default_timeout: std::time::Duration,
}

impl MigrationConfig {
    pub fn for_service(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Self::default()
        }
    }
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            version_collection: "_migrations".to_string(),
            service_name: "default".to_string(),
            default_timeout: std::time::Duration::from_secs(300),
        }
    }
}

/// Register a migration with the inventory so [`create_migration_registry`]
/// picks it up. The migration type must implement `Default`.
#[macro_export]
macro_rules! register_migration {
    ($migration_type:ty) => {
        $crate::inventory::submit! {
            $crate::MigrationRegistration::new(
                stringify!($migration_type),
                || Box::new(<$migration_type>::default())
            )
        }
    };
}
