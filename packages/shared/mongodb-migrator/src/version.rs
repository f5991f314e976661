use std::collections::BTreeSet;

use anyhow::Result;
use bson::doc;
use futures::TryStreamExt;
use mongodb::options::{FindOptions, IndexOptions, ReplaceOptions};
use mongodb::{Collection, Database, IndexModel};
use serde::{Deserialize, Serialize};

use crate::{MigrationConfig, MigrationResult, MigrationStatus};

/// Version record stored in the service's migration collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationVersion {
    pub version: u32,
    pub description: String,
    pub applied_at: bson::DateTime,
    pub duration_ms: u64,
    pub rolled_back_at: Option<bson::DateTime>,
    pub service_name: String,
}

impl MigrationVersion {
    pub fn is_active(&self) -> bool {
        self.rolled_back_at.is_none()
    }
}

/// Tracks which migrations are applied for one service
pub struct VersionTracker {
    collection: Collection<MigrationVersion>,
    service_name: String,
}

impl VersionTracker {
    pub fn new(database: &Database, config: &MigrationConfig) -> Self {
        Self {
            collection: database.collection::<MigrationVersion>(&config.version_collection),
            service_name: config.service_name.clone(),
        }
    }

    pub async fn initialize(&self) -> Result<()> {
        self.collection
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "service_name": 1, "version": 1 })
                    .options(IndexOptions::builder().unique(true).build())
                    .build(),
                None,
            )
            .await?;

        tracing::debug!(service = %self.service_name, "Migration version tracking initialized");
        Ok(())
    }

    pub async fn record_migration(&self, result: &MigrationResult) -> Result<()> {
        if !result.success {
            return Ok(());
        }

        let record = MigrationVersion {
            version: result.version,
            description: result.description.clone(),
            applied_at: bson::DateTime::from_chrono(result.executed_at),
            duration_ms: result.duration_ms,
            rolled_back_at: None,
            service_name: self.service_name.clone(),
        };

        // Re-applying a rolled back version replaces its old record
        self.collection
            .replace_one(
                doc! { "service_name": &self.service_name, "version": result.version },
                &record,
                ReplaceOptions::builder().upsert(true).build(),
            )
            .await?;

        tracing::info!(service = %self.service_name, version = result.version, "Recorded migration");
        Ok(())
    }

    pub async fn record_rollback(&self, version: u32) -> Result<()> {
        self.collection
            .update_one(
                doc! { "service_name": &self.service_name, "version": version },
                doc! { "$set": { "rolled_back_at": bson::DateTime::now() } },
                None,
            )
            .await?;

        tracing::info!(service = %self.service_name, version, "Recorded rollback");
        Ok(())
    }

    /// Every version record for this service, oldest first
    pub async fn history(&self) -> Result<Vec<MigrationVersion>> {
        let cursor = self
            .collection
            .find(
                doc! { "service_name": &self.service_name },
                FindOptions::builder().sort(doc! { "version": 1 }).build(),
            )
            .await?;
        Ok(cursor.try_collect().await?)
    }

    /// Versions currently applied (not rolled back)
    pub async fn applied_versions(&self) -> Result<BTreeSet<u32>> {
        Ok(self
            .history()
            .await?
            .into_iter()
            .filter(MigrationVersion::is_active)
            .map(|m| m.version)
            .collect())
    }

    pub async fn is_applied(&self, version: u32) -> Result<bool> {
        Ok(self.get_status(version).await? == MigrationStatus::Applied)
    }

    pub async fn get_status(&self, version: u32) -> Result<MigrationStatus> {
        let record = self
            .collection
            .find_one(doc! { "service_name": &self.service_name, "version": version }, None)
            .await?;

        Ok(match record {
            None => MigrationStatus::Pending,
            Some(m) if m.is_active() => MigrationStatus::Applied,
            Some(_) => MigrationStatus::RolledBack,
        })
    }

    pub async fn get_stats(&self) -> Result<MigrationStats> {
        Ok(MigrationStats::from_history(&self.service_name, &self.history().await?))
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }
}

#[derive(Debug, Clone)]
pub struct MigrationStats {
    pub total_applied: u32,
    pub total_rolled_back: u32,
    pub latest_version: Option<u32>,
    pub avg_duration_ms: f64,
    pub total_duration_ms: u64,
    pub service_name: String,
}

impl MigrationStats {
    pub fn from_history(service_name: &str, history: &[MigrationVersion]) -> Self {
        let active: Vec<&MigrationVersion> = history.iter().filter(|m| m.is_active()).collect();
        let total_duration_ms: u64 = active.iter().map(|m| m.duration_ms).sum();
        let avg_duration_ms = if active.is_empty() {
            0.0
        } else {
            total_duration_ms as f64 / active.len() as f64
        };

        Self {
            total_applied: active.len() as u32,
            total_rolled_back: (history.len() - active.len()) as u32,
            latest_version: active.iter().map(|m| m.version).max(),
            avg_duration_ms,
            total_duration_ms,
            service_name: service_name.to_string(),
        }
    }

    pub fn summary(&self) -> String {
        match self.latest_version {
            Some(version) => format!(
                "Service '{}' at version {}, {} applied, {} rolled back",
                self.service_name, version, self.total_applied, self.total_rolled_back
            ),
            None => format!("Service '{}' has no applied migrations", self.service_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(version: u32, duration_ms: u64, rolled_back: bool) -> MigrationVersion {
        MigrationVersion {
            version,
            description: format!("m{}", version),
            applied_at: bson::DateTime::now(),
            duration_ms,
            rolled_back_at: rolled_back.then(bson::DateTime::now),
            service_name: "catalog".to_string(),
        }
    }

    #[test]
    fn test_stats_ignore_rolled_back_versions() {
        let history = vec![record(1, 100, false), record(2, 300, false), record(3, 50, true)];
        let stats = MigrationStats::from_history("catalog", &history);

        assert_eq!(stats.total_applied, 2);
        assert_eq!(stats.total_rolled_back, 1);
        assert_eq!(stats.latest_version, Some(2));
        assert_eq!(stats.total_duration_ms, 400);
        assert_eq!(stats.avg_duration_ms, 200.0);
        assert!(stats.summary().contains("version 2"));
    }

    #[test]
    fn test_stats_empty_history() {
        let stats = MigrationStats::from_history("catalog", &[]);
        assert_eq!(stats.latest_version, None);
        assert_eq!(stats.avg_duration_ms, 0.0);
        assert!(stats.summary().contains("no applied migrations"));
    }
}
