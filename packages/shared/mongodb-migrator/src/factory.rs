use anyhow::Result;

use crate::{Migration, MigrationRegistry};

/// Inventory entry emitted by [`register_migration!`](crate::register_migration)
pub struct MigrationRegistration {
    pub name: &'static str,
    pub constructor: fn() -> Box<dyn Migration>,
}

impl MigrationRegistration {
    pub const fn new(name: &'static str, constructor: fn() -> Box<dyn Migration>) -> Self {
        Self { name, constructor }
    }
}

inventory::collect!(MigrationRegistration);

/// Build a registry from every migration linked into the binary
pub fn create_migration_registry() -> Result<MigrationRegistry> {
    let mut registry = MigrationRegistry::new();

    for registration in inventory::iter::<MigrationRegistration>() {
        registry.register_boxed((registration.constructor)())?;
        tracing::debug!(migration = registration.name, "Registered migration");
    }

    tracing::info!(count = registry.count(), "Migration registry created");
    Ok(registry)
}

/// Names of all registered migrations, in link order
pub fn registered_migration_names() -> Vec<&'static str> {
    inventory::iter::<MigrationRegistration>()
        .map(|reg| reg.name)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inventory_discovery_matches_names() {
        let registry = create_migration_registry().unwrap();
        assert_eq!(registry.count(), registered_migration_names().len());
    }
}
