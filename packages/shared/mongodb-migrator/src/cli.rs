//! Migration subcommands shared by every service binary.
//!
//! A service embeds [`MigrationCommand`] in its own clap parser and hands the
//! parsed value to [`MigrationCliRunner::execute_command`].

use anyhow::Result;
use clap::Subcommand;
use mongodb::Client;

use crate::{
    create_migration_registry, MigrationConfig, MigrationOptions, MigrationPlan, MigrationResult, MigrationRunner,
};

#[derive(Debug, Clone, Subcommand)]
pub enum MigrationCommand {
    /// Run all pending migrations
    Up {
        /// Show what would be executed
        #[arg(long)]
        dry_run: bool,
        /// Re-run migrations that are already applied
        #[arg(long)]
        force: bool,
    },
    /// Roll back the last migration
    Down {
        #[arg(long)]
        dry_run: bool,
        #[arg(long)]
        force: bool,
    },
    /// Migrate forward or backward to a specific version
    To {
        version: u32,
        #[arg(long)]
        dry_run: bool,
        #[arg(long)]
        force: bool,
    },
    /// Show migration status
    Status,
    /// Show the migration plan without executing it
    Plan {
        version: Option<u32>,
    },
}

/// Connection details a service provides to the migration CLI
pub trait ServiceConfig {
    fn mongodb_uri(&self) -> &str;

    fn database_name(&self) -> &str;

    fn migration_config(&self) -> MigrationConfig;
}

pub struct MigrationCliRunner<C: ServiceConfig> {
    config: C,
}

impl<C: ServiceConfig> MigrationCliRunner<C> {
    pub fn new(config: C) -> Self {
        Self { config }
    }

    pub async fn execute_command(&self, command: MigrationCommand) -> Result<()> {
        let client = Client::with_uri_str(self.config.mongodb_uri()).await?;
        let database = client.database(self.config.database_name());

        let runner = MigrationRunner::with_config(database, create_migration_registry()?, self.config.migration_config());
        runner.initialize().await?;

        match command {
            MigrationCommand::Up { dry_run, force } => {
                println!("🚀 Running all pending migrations...");
                if dry_run {
                    print_dry_run(&runner.plan(None).await?);
                } else {
                    let results = runner.migrate_up(Some(options(force))).await?;
                    print_results("No pending migrations to apply", &results);
                }
            }
            MigrationCommand::Down { dry_run, force } => {
                println!("⏪ Rolling back last migration...");
                if dry_run {
                    print_dry_run(&runner.rollback_plan().await?);
                } else {
                    let results = runner.rollback_one(Some(options(force))).await?;
                    print_results("No migrations to rollback", &results);
                }
            }
            MigrationCommand::To { version, dry_run, force } => {
                println!("🎯 Migrating to version {}...", version);
                if dry_run {
                    print_dry_run(&runner.plan(Some(version)).await?);
                } else {
                    let results = runner.migrate_to(version, Some(options(force))).await?;
                    print_results("Already at target version", &results);
                }
            }
            MigrationCommand::Status => {
                let status = runner.status().await?;
                println!("📊 Migration Status for '{}'", status.service_name);
                println!("Current version: {}", status.current_version);
                println!("Latest available: {}", status.latest_available_version);
                println!("Pending migrations: {}", status.pending_count);
                println!("Total applied: {}", status.total_applied);
                println!("Total rolled back: {}", status.total_rolled_back);
                if status.total_applied > 0 {
                    println!("Average duration: {:.1}ms", status.avg_duration_ms);
                }
                println!();
                println!("{}", status.summary());
            }
            MigrationCommand::Plan { version } => {
                let plan = runner.plan(version).await?;
                println!("📋 Migration Plan for '{}'", runner.config().service_name);
                for line in plan.lines() {
                    println!("{}", line);
                }
            }
        }

        Ok(())
    }
}

fn options(force: bool) -> MigrationOptions {
    MigrationOptions {
        force,
        ..Default::default()
    }
}

fn dry_run_lines(plan: &MigrationPlan) -> Vec<String> {
    std::iter::once("🔍 DRY RUN: nothing will be executed".to_string())
        .chain(plan.lines())
        .collect()
}

fn print_dry_run(plan: &MigrationPlan) {
    for line in dry_run_lines(plan) {
        println!("{}", line);
    }
}

fn print_results(empty_message: &str, results: &[MigrationResult]) {
    if results.is_empty() {
        println!("✅ {}", empty_message);
        return;
    }
    for result in results {
        println!("  {}", result.line());
    }
}
