use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::Database;
use serde::{Deserialize, Serialize};

/// A single reversible change to a service's database
#[async_trait]
pub trait Migration: Send + Sync {
    /// Unique, contiguous version number starting at 1
    fn version(&self) -> u32;

    fn description(&self) -> &str;

    /// Apply the migration
    async fn up(&self, db: &Database) -> Result<()>;

    /// Revert the migration
    async fn down(&self, db: &Database) -> Result<()>;

    /// Checked before `up`; a failure is reported without touching the database
    async fn validate(&self, _db: &Database) -> Result<()> {
        Ok(())
    }
}

/// Outcome of running one migration step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationResult {
    pub version: u32,
    pub description: String,
    pub executed_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub success: bool,
    pub error_message: Option<String>,
}

impl MigrationResult {
    pub fn success(version: u32, description: String, executed_at: DateTime<Utc>, duration_ms: u64) -> Self {
        Self {
            version,
            description,
            executed_at,
            duration_ms,
            success: true,
            error_message: None,
        }
    }

    pub fn failure(
        version: u32,
        description: String,
        executed_at: DateTime<Utc>,
        duration_ms: u64,
        error: String,
    ) -> Self {
        Self {
            version,
            description,
            executed_at,
            duration_ms,
            success: false,
            error_message: Some(error),
        }
    }

    /// One-line rendering used by the CLI and startup logs
    pub fn line(&self) -> String {
        match &self.error_message {
            None => format!("✓ {}: {} ({}ms)", self.version, self.description, self.duration_ms),
            Some(err) => format!("✗ {}: {} - FAILED: {}", self.version, self.description, err),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MigrationOptions {
    /// Plan only; nothing is executed
    pub dry_run: bool,
    /// Re-run steps the tracker already considers applied (or rolled back)
    pub force: bool,
    pub timeout: Option<std::time::Duration>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MigrationStatus {
    Pending,
    Applied,
    RolledBack,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_result_success() {
        let result = MigrationResult::success(1, "Create products".to_string(), Utc::now(), 100);

        assert!(result.success);
        assert!(result.error_message.is_none());
        assert_eq!(result.line(), "✓ 1: Create products (100ms)");
    }

    #[test]
    fn test_migration_result_failure() {
        let result = MigrationResult::failure(
            2,
            "Create indexes".to_string(),
            Utc::now(),
            50,
            "index build aborted".to_string(),
        );

        assert!(!result.success);
        assert_eq!(result.error_message.as_deref(), Some("index build aborted"));
        assert!(result.line().contains("FAILED: index build aborted"));
    }

    #[test]
    fn test_migration_options_default() {
        let options = MigrationOptions::default();
        assert!(!options.dry_run);
        assert!(!options.force);
        assert!(options.timeout.is_none());
    }
}
