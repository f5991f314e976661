use std::collections::{BTreeMap, BTreeSet};

use anyhow::{anyhow, Result};

use crate::Migration;

/// All migrations known to a service, keyed by version
#[derive(Default)]
pub struct MigrationRegistry {
    migrations: BTreeMap<u32, Box<dyn Migration>>,
}

impl MigrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a migration, chaining style
    pub fn with<M: Migration + 'static>(mut self, migration: M) -> Result<Self> {
        self.register_boxed(Box::new(migration))?;
        Ok(self)
    }

    pub fn register_boxed(&mut self, migration: Box<dyn Migration>) -> Result<()> {
        let version = migration.version();
        if self.migrations.contains_key(&version) {
            return Err(anyhow!("Migration version {} is already registered", version));
        }
        self.migrations.insert(version, migration);
        Ok(())
    }

    pub fn get_migration(&self, version: u32) -> Option<&dyn Migration> {
        self.migrations.get(&version).map(|m| m.as_ref())
    }

    /// Sorted ascending
    pub fn get_versions(&self) -> Vec<u32> {
        self.migrations.keys().copied().collect()
    }

    pub fn count(&self) -> usize {
        self.migrations.len()
    }

    /// Versions must start at 1 and have no gaps
    pub fn validate_sequence(&self) -> Result<()> {
        let mut expected = 1;
        for version in self.migrations.keys() {
            if *version != expected {
                return Err(anyhow!(
                    "Gap in migration sequence: expected version {}, found {}",
                    expected,
                    version
                ));
            }
            expected += 1;
        }
        Ok(())
    }

    /// Work out which steps move the database from `applied` to `target`
    /// (`None` means the latest registered version).
    pub fn plan(&self, applied: &BTreeSet<u32>, target: Option<u32>) -> Result<MigrationPlan> {
        let current_version = applied.iter().next_back().copied().unwrap_or(0);

        if let Some(target) = target {
            if target < current_version {
                let mut migrations = Vec::new();
                for version in applied.iter().rev().filter(|v| **v > target) {
                    let migration = self.get_migration(*version).ok_or_else(|| {
                        anyhow!("Migration version {} is applied but not found in registry", version)
                    })?;
                    migrations.push(MigrationInfo::of(migration));
                }
                return Ok(MigrationPlan {
                    plan_type: PlanType::Rollback,
                    current_version,
                    target_version: Some(target),
                    migrations,
                });
            }
            if target == current_version {
                return Ok(MigrationPlan {
                    plan_type: PlanType::NoOp,
                    current_version,
                    target_version: Some(target),
                    migrations: Vec::new(),
                });
            }
        }

        let migrations: Vec<MigrationInfo> = self
            .migrations
            .values()
            .filter(|m| !applied.contains(&m.version()))
            .filter(|m| target.map_or(true, |t| m.version() <= t))
            .map(|m| MigrationInfo::of(m.as_ref()))
            .collect();
        let target_version = target.or_else(|| migrations.last().map(|m| m.version));

        Ok(MigrationPlan {
            plan_type: PlanType::Forward,
            current_version,
            target_version,
            migrations,
        })
    }
}

#[derive(Debug, Clone)]
pub struct MigrationPlan {
    pub plan_type: PlanType,
    pub current_version: u32,
    pub target_version: Option<u32>,
    pub migrations: Vec<MigrationInfo>,
}

impl MigrationPlan {
    pub fn has_migrations(&self) -> bool {
        !self.migrations.is_empty()
    }

    /// Summary followed by one line per migration, in execution order
    pub fn lines(&self) -> Vec<String> {
        std::iter::once(self.summary())
            .chain(self.migrations.iter().map(|m| format!("  {} - {}", m.version, m.description)))
            .collect()
    }

    pub fn summary(&self) -> String {
        let target = self.target_version.unwrap_or(self.current_version);
        match self.plan_type {
            PlanType::Forward if self.migrations.is_empty() => "No pending migrations".to_string(),
            PlanType::Forward => format!(
                "Apply {} migration(s) from version {} to {}",
                self.migrations.len(),
                self.current_version,
                target
            ),
            PlanType::Rollback => format!(
                "Rollback {} migration(s) from version {} to {}",
                self.migrations.len(),
                self.current_version,
                target
            ),
            PlanType::NoOp => "No migrations needed".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlanType {
    Forward,
    Rollback,
    NoOp,
}

#[derive(Debug, Clone)]
pub struct MigrationInfo {
    pub version: u32,
    pub description: String,
}

impl MigrationInfo {
    fn of(migration: &dyn Migration) -> Self {
        Self {
            version: migration.version(),
            description: migration.description().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mongodb::Database;

    struct Step(u32);

    #[async_trait]
    impl Migration for Step {
        fn version(&self) -> u32 {
            self.0
        }

        fn description(&self) -> &str {
            "step"
        }

        async fn up(&self, _db: &Database) -> anyhow::Result<()> {
            Ok(())
        }

        async fn down(&self, _db: &Database) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn registry(versions: &[u32]) -> MigrationRegistry {
        let mut registry = MigrationRegistry::new();
        for v in versions {
            registry.register_boxed(Box::new(Step(*v))).unwrap();
        }
        registry
    }

    fn applied(versions: &[u32]) -> BTreeSet<u32> {
        versions.iter().copied().collect()
    }

    #[test]
    fn test_versions_sorted_regardless_of_registration_order() {
        let registry = registry(&[3, 1, 2]);
        assert_eq!(registry.get_versions(), vec![1, 2, 3]);
    }

    #[test]
    fn test_duplicate_version_rejected() {
        let result = MigrationRegistry::new().with(Step(1)).and_then(|r| r.with(Step(1)));
        assert!(result.is_err());
    }

    #[test]
    fn test_sequence_validation() {
        assert!(registry(&[1, 2]).validate_sequence().is_ok());
        assert!(registry(&[1, 3]).validate_sequence().is_err());
        assert!(registry(&[0]).validate_sequence().is_err());
        assert!(registry(&[]).validate_sequence().is_ok());
    }

    #[test]
    fn test_forward_plan_skips_applied() {
        let plan = registry(&[1, 2, 3]).plan(&applied(&[1]), None).unwrap();
        assert_eq!(plan.plan_type, PlanType::Forward);
        assert_eq!(plan.current_version, 1);
        assert_eq!(plan.target_version, Some(3));
        let versions: Vec<u32> = plan.migrations.iter().map(|m| m.version).collect();
        assert_eq!(versions, vec![2, 3]);
        assert_eq!(plan.summary(), "Apply 2 migration(s) from version 1 to 3");
    }

    #[test]
    fn test_plan_lines_list_pending_migrations() {
        let plan = registry(&[1, 2, 3]).plan(&applied(&[1]), None).unwrap();
        assert_eq!(
            plan.lines(),
            vec![
                "Apply 2 migration(s) from version 1 to 3".to_string(),
                "  2 - step".to_string(),
                "  3 - step".to_string(),
            ]
        );
    }

    #[test]
    fn test_forward_plan_to_target() {
        let plan = registry(&[1, 2, 3]).plan(&applied(&[]), Some(2)).unwrap();
        let versions: Vec<u32> = plan.migrations.iter().map(|m| m.version).collect();
        assert_eq!(versions, vec![1, 2]);
    }

    #[test]
    fn test_rollback_plan_newest_first() {
        let plan = registry(&[1, 2, 3]).plan(&applied(&[1, 2, 3]), Some(1)).unwrap();
        assert_eq!(plan.plan_type, PlanType::Rollback);
        let versions: Vec<u32> = plan.migrations.iter().map(|m| m.version).collect();
        assert_eq!(versions, vec![3, 2]);
    }

    #[test]
    fn test_rollback_of_unknown_version_fails() {
        assert!(registry(&[1]).plan(&applied(&[1, 2]), Some(0)).is_err());
    }

    #[test]
    fn test_noop_plan() {
        let plan = registry(&[1, 2]).plan(&applied(&[1, 2]), Some(2)).unwrap();
        assert_eq!(plan.plan_type, PlanType::NoOp);
        assert!(!plan.has_migrations());
    }
}
