use anyhow::Result;
use async_trait::async_trait;
use bson::{doc, Document};
use mongodb::options::IndexOptions;
use mongodb::{Database, IndexModel};

use mongodb_migrator::{register_migration, Migration};

use crate::models::{CATEGORIES, PRODUCT_NAME};
use crate::validation::{CATEGORIES_COLLECTION, PRODUCTS_COLLECTION};

const PRODUCT_CATEGORIES_INDEX: &str = "categories_1";
const PRODUCT_NAME_INDEX: &str = "product_name_1";
const CATEGORY_NAME_INDEX: &str = "name_1";

#[derive(Default)]
pub struct CatalogIndexes;

register_migration!(CatalogIndexes);

fn index(keys: Document, name: &str) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().name(name.to_string()).build())
        .build()
}

#[async_trait]
impl Migration for CatalogIndexes {
    fn version(&self) -> u32 {
        2
    }

    fn description(&self) -> &str {
        "Index product categories, product names and category names"
    }

    async fn up(&self, db: &Database) -> Result<()> {
        let products = db.collection::<Document>(PRODUCTS_COLLECTION);
        products
            .create_index(index(doc! { CATEGORIES: 1 }, PRODUCT_CATEGORIES_INDEX), None)
            .await?;
        products
            .create_index(index(doc! { PRODUCT_NAME: 1 }, PRODUCT_NAME_INDEX), None)
            .await?;

        // Non-unique: category registration is check-then-insert and existing
        // data may already hold duplicate names
        db.collection::<Document>(CATEGORIES_COLLECTION)
            .create_index(index(doc! { "name": 1 }, CATEGORY_NAME_INDEX), None)
            .await?;

        tracing::info!("Catalog indexes created");
        Ok(())
    }

    async fn down(&self, db: &Database) -> Result<()> {
        let products = db.collection::<Document>(PRODUCTS_COLLECTION);
        products.drop_index(PRODUCT_CATEGORIES_INDEX, None).await?;
        products.drop_index(PRODUCT_NAME_INDEX, None).await?;
        db.collection::<Document>(CATEGORIES_COLLECTION)
            .drop_index(CATEGORY_NAME_INDEX, None)
            .await?;
        Ok(())
    }
}
