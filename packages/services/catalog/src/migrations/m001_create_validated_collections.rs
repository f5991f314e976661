use anyhow::Result;
use async_trait::async_trait;
use mongodb::Database;

use mongodb_migrator::validator::remove_validator;
use mongodb_migrator::{apply_validator, register_migration, Migration};

use crate::validation::{category_schema, product_schema, CATEGORIES_COLLECTION, PRODUCTS_COLLECTION};

/// Create `products` and `categories` with their `$jsonSchema` validators,
/// or install the validators on collections that already exist
#[derive(Default)]
pub struct CreateValidatedCollections;

register_migration!(CreateValidatedCollections);

#[async_trait]
impl Migration for CreateValidatedCollections {
    fn version(&self) -> u32 {
        1
    }

    fn description(&self) -> &str {
        "Create products and categories collections with schema validators"
    }

    async fn up(&self, db: &Database) -> Result<()> {
        let products = apply_validator(db, PRODUCTS_COLLECTION, product_schema()).await?;
        let categories = apply_validator(db, CATEGORIES_COLLECTION, category_schema()).await?;
        tracing::info!(?products, ?categories, "Collection validators in place");
        Ok(())
    }

    // Collections and their data are kept; only the validators go
    async fn down(&self, db: &Database) -> Result<()> {
        remove_validator(db, PRODUCTS_COLLECTION).await?;
        remove_validator(db, CATEGORIES_COLLECTION).await?;
        Ok(())
    }
}
