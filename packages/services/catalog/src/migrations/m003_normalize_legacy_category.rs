use anyhow::Result;
use async_trait::async_trait;
use bson::{doc, Document};
use mongodb::options::UpdateOptions;
use mongodb::Database;

use mongodb_migrator::{register_migration, Migration};

use crate::models::{CATEGORIES, LEGACY_CATEGORY};
use crate::validation::PRODUCTS_COLLECTION;

/// Rewrite products that carry a scalar `category` into the `categories`
/// array. Records that already have `categories` only lose the scalar.
#[derive(Default)]
pub struct NormalizeLegacyCategory;

register_migration!(NormalizeLegacyCategory);

pub fn legacy_filter() -> Document {
    doc! { LEGACY_CATEGORY: { "$exists": true } }
}

/// Pipeline update; `$ifNull` keeps an existing `categories` array
pub fn normalize_pipeline() -> Vec<Document> {
    vec![
        doc! {
            "$set": {
                CATEGORIES: {
                    "$ifNull": [
                        format!("${}", CATEGORIES),
                        [ format!("${}", LEGACY_CATEGORY) ],
                    ]
                }
            }
        },
        doc! { "$unset": LEGACY_CATEGORY },
    ]
}

/// Skips the collection validator. `update_many` is not atomic, so a legacy
/// record the validator would reject must not stop the rewrite partway.
pub fn normalize_options() -> UpdateOptions {
    UpdateOptions::builder().bypass_document_validation(true).build()
}

#[async_trait]
impl Migration for NormalizeLegacyCategory {
    fn version(&self) -> u32 {
        3
    }

    fn description(&self) -> &str {
        "Move scalar product category into the categories array"
    }

    async fn up(&self, db: &Database) -> Result<()> {
        let result = db
            .collection::<Document>(PRODUCTS_COLLECTION)
            .update_many(legacy_filter(), normalize_pipeline(), normalize_options())
            .await?;
        tracing::info!(matched = result.matched_count, modified = result.modified_count, "Normalized legacy product categories");
        Ok(())
    }

    // The scalar form is not restored
    async fn down(&self, _db: &Database) -> Result<()> {
        tracing::warn!("Legacy category normalization is irreversible; nothing to roll back");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_prefers_existing_array() {
        let pipeline = normalize_pipeline();
        assert_eq!(pipeline.len(), 2);

        let set = pipeline[0].get_document("$set").unwrap();
        let if_null = set.get_document("categories").unwrap().get_array("$ifNull").unwrap();
        assert_eq!(if_null[0].as_str(), Some("$categories"));
        assert_eq!(if_null[1].as_array().unwrap()[0].as_str(), Some("$category"));

        assert_eq!(pipeline[1].get_str("$unset").unwrap(), "category");
    }

    #[test]
    fn test_only_legacy_records_are_touched() {
        assert_eq!(legacy_filter(), doc! { "category": { "$exists": true } });
    }

    #[test]
    fn test_update_bypasses_validator() {
        assert_eq!(normalize_options().bypass_document_validation, Some(true));
    }

    #[test]
    fn test_catalog_migrations_are_registered_contiguously() {
        let registry = mongodb_migrator::create_migration_registry().unwrap();
        assert_eq!(registry.get_versions(), vec![1, 2, 3]);
        assert!(registry.validate_sequence().is_ok());
    }
}
