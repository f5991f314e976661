//! Catalog service migrations.
//!
//! Each migration registers itself with the shared migrator's inventory;
//! linking this module into the binary is enough for the runner to see it.

pub mod m001_create_validated_collections;
pub mod m002_catalog_indexes;
pub mod m003_normalize_legacy_category;

/// Service name recorded on every applied migration
pub const SERVICE_NAME: &str = "catalog";
