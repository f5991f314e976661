use std::time::Instant;

use anyhow::{anyhow, Result};
use chrono::Utc;
use mongodb::Database;

use crate::{
    Migration, MigrationConfig, MigrationOptions, MigrationPlan, MigrationRegistry,
    MigrationResult, PlanType, VersionTracker,
};

/// Executes migration plans against one service database
pub struct MigrationRunner {
    database: Database,
    registry: MigrationRegistry,
    version_tracker: VersionTracker,
    config: MigrationConfig,
}

impl MigrationRunner {
    pub fn with_config(database: Database, registry: MigrationRegistry, config: MigrationConfig) -> Self {
        let version_tracker = VersionTracker::new(&database, &config);
        Self {
            database,
            registry,
            version_tracker,
            config,
        }
    }

    pub async fn initialize(&self) -> Result<()> {
        self.registry.validate_sequence()?;
        self.version_tracker.initialize().await?;
        tracing::info!(
            service = %self.config.service_name,
            migrations = self.registry.count(),
            "Migration system initialized"
        );
        Ok(())
    }

    /// Apply every pending migration
    pub async fn migrate_up(&self, options: Option<MigrationOptions>) -> Result<Vec<MigrationResult>> {
        let plan = self.plan(None).await?;
        self.execute_plan(plan, options.unwrap_or_default()).await
    }

    /// Move forward or backward to `target_version`
    pub async fn migrate_to(&self, target_version: u32, options: Option<MigrationOptions>) -> Result<Vec<MigrationResult>> {
        let plan = self.plan(Some(target_version)).await?;
        self.execute_plan(plan, options.unwrap_or_default()).await
    }

    /// Roll back the newest applied migration
    pub async fn rollback_one(&self, options: Option<MigrationOptions>) -> Result<Vec<MigrationResult>> {
        let plan = self.rollback_plan().await?;
        self.execute_plan(plan, options.unwrap_or_default()).await
    }

    /// Plan that undoes only the newest applied migration
    pub async fn rollback_plan(&self) -> Result<MigrationPlan> {
        let applied = self.version_tracker.applied_versions().await?;
        let current = applied
            .iter()
            .next_back()
            .copied()
            .ok_or_else(|| anyhow!("No migrations to rollback for service '{}'", self.config.service_name))?;

        let plan = self.registry.plan(&applied, Some(current - 1))?;
        if plan.plan_type != PlanType::Rollback {
            return Err(anyhow!("Expected rollback plan, got {:?}", plan.plan_type));
        }
        Ok(plan)
    }

    pub async fn plan(&self, target_version: Option<u32>) -> Result<MigrationPlan> {
        let applied = self.version_tracker.applied_versions().await?;
        self.registry.plan(&applied, target_version)
    }

    pub async fn status(&self) -> Result<MigrationRunnerStatus> {
        let applied = self.version_tracker.applied_versions().await?;
        let stats = self.version_tracker.get_stats().await?;
        let versions = self.registry.get_versions();

        Ok(MigrationRunnerStatus {
            service_name: self.config.service_name.clone(),
            current_version: applied.iter().next_back().copied().unwrap_or(0),
            latest_available_version: versions.last().copied().unwrap_or(0),
            pending_count: versions.iter().filter(|v| !applied.contains(v)).count(),
            total_applied: stats.total_applied,
            total_rolled_back: stats.total_rolled_back,
            avg_duration_ms: stats.avg_duration_ms,
        })
    }

    async fn execute_plan(&self, plan: MigrationPlan, options: MigrationOptions) -> Result<Vec<MigrationResult>> {
        if !plan.has_migrations() {
            tracing::info!(service = %self.config.service_name, "{}", plan.summary());
            return Ok(Vec::new());
        }

        tracing::info!(service = %self.config.service_name, dry_run = options.dry_run, "{}", plan.summary());
        if options.dry_run {
            return Ok(Vec::new());
        }

        let mut results = Vec::new();
        for info in &plan.migrations {
            let migration = self
                .registry
                .get_migration(info.version)
                .ok_or_else(|| anyhow!("Migration {} not found in registry", info.version))?;

            let result = match plan.plan_type {
                PlanType::Forward => self.execute_up(migration, &options).await?,
                PlanType::Rollback => self.execute_down(migration, &options).await?,
                PlanType::NoOp => continue,
            };

            let failed = !result.success;
            results.push(result);
            // Later steps may depend on this one
            if failed {
                break;
            }
        }

        Ok(results)
    }

    async fn execute_up(&self, migration: &dyn Migration, options: &MigrationOptions) -> Result<MigrationResult> {
        let version = migration.version();
        let description = migration.description().to_string();

        if self.version_tracker.is_applied(version).await? && !options.force {
            return Err(anyhow!(
                "Migration {} is already applied for service '{}'",
                version,
                self.config.service_name
            ));
        }

        if let Err(e) = migration.validate(&self.database).await {
            tracing::error!(version, error = %e, "Migration validation failed");
            return Ok(MigrationResult::failure(
                version,
                description,
                Utc::now(),
                0,
                format!("Validation failed: {}", e),
            ));
        }

        tracing::info!(service = %self.config.service_name, version, %description, "Applying migration");
        let result = self.timed(version, description, migration.up(&self.database), options).await;
        self.version_tracker.record_migration(&result).await?;
        Ok(result)
    }

    async fn execute_down(&self, migration: &dyn Migration, options: &MigrationOptions) -> Result<MigrationResult> {
        let version = migration.version();
        let description = format!("Rollback: {}", migration.description());

        if !self.version_tracker.is_applied(version).await? && !options.force {
            return Err(anyhow!(
                "Migration {} is not applied for service '{}', cannot rollback",
                version,
                self.config.service_name
            ));
        }

        tracing::info!(service = %self.config.service_name, version, "Rolling back migration");
        let result = self.timed(version, description, migration.down(&self.database), options).await;
        if result.success {
            self.version_tracker.record_rollback(version).await?;
        }
        Ok(result)
    }

    async fn timed<F>(&self, version: u32, description: String, step: F, options: &MigrationOptions) -> MigrationResult
    where
        F: std::future::Future<Output = Result<()>>,
    {
        let timeout = options.timeout.unwrap_or(self.config.default_timeout);
        let executed_at = Utc::now();
        let started = Instant::now();

        let outcome = tokio::time::timeout(timeout, step).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(())) => {
                tracing::info!(version, duration_ms, "Migration step succeeded");
                MigrationResult::success(version, description, executed_at, duration_ms)
            }
            Ok(Err(e)) => {
                tracing::error!(version, error = %e, "Migration step failed");
                MigrationResult::failure(version, description, executed_at, duration_ms, e.to_string())
            }
            Err(_) => {
                tracing::error!(version, ?timeout, "Migration step timed out");
                MigrationResult::failure(version, description, executed_at, duration_ms, "Migration timed out".to_string())
            }
        }
    }

    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }
}

#[derive(Debug, Clone)]
pub struct MigrationRunnerStatus {
    pub service_name: String,
    pub current_version: u32,
    pub latest_available_version: u32,
    pub pending_count: usize,
    pub total_applied: u32,
    pub total_rolled_back: u32,
    pub avg_duration_ms: f64,
}

impl MigrationRunnerStatus {
    pub fn is_up_to_date(&self) -> bool {
        self.pending_count == 0
    }

    pub fn summary(&self) -> String {
        if self.is_up_to_date() {
            format!("Service '{}' is up to date at version {}", self.service_name, self.current_version)
        } else {
            format!(
                "Service '{}' at version {}, {} migration(s) pending (latest: {})",
                self.service_name, self.current_version, self.pending_count, self.latest_available_version
            )
        }
    }
}
