//! Collection validators.
//!
//! MongoDB only accepts a `validator` at collection creation; an existing
//! collection has to be altered with `collMod`. [`apply_validator`] hides
//! that split so migrations can declare a schema idempotently.

use anyhow::Result;
use bson::{doc, Document};
use mongodb::options::{CreateCollectionOptions, ValidationAction, ValidationLevel};
use mongodb::Database;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidatorOutcome {
    /// The collection did not exist and was created with the validator
    Created,
    /// The collection existed and its validator was replaced
    Updated,
}

/// Create `collection` with `schema` as its `$jsonSchema` validator, or
/// replace the validator when the collection already exists.
///
/// Validation is strict and rejecting: every insert and update must satisfy
/// the schema.
pub async fn apply_validator(db: &Database, collection: &str, schema: Document) -> Result<ValidatorOutcome> {
    let validator = doc! { "$jsonSchema": schema };
    let existing = db
        .list_collection_names(doc! { "name": collection })
        .await?;

    if existing.iter().any(|name| name == collection) {
        db.run_command(collmod_command(collection, validator), None).await?;
        tracing::info!(collection, "Updated collection validator");
        return Ok(ValidatorOutcome::Updated);
    }

    let options = CreateCollectionOptions::builder()
        .validator(validator)
        .validation_level(ValidationLevel::Strict)
        .validation_action(ValidationAction::Error)
        .build();
    db.create_collection(collection, options).await?;
    tracing::info!(collection, "Created collection with validator");
    Ok(ValidatorOutcome::Created)
}

/// Drop the validator from an existing collection
pub async fn remove_validator(db: &Database, collection: &str) -> Result<()> {
    db.run_command(collmod_command(collection, Document::new()), None).await?;
    tracing::info!(collection, "Removed collection validator");
    Ok(())
}

fn collmod_command(collection: &str, validator: Document) -> Document {
    doc! {
        "collMod": collection,
        "validator": validator,
        "validationLevel": "strict",
        "validationAction": "error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collmod_command_shape() {
        let cmd = collmod_command("categories", doc! { "$jsonSchema": { "required": ["name"] } });

        assert_eq!(cmd.get_str("collMod").unwrap(), "categories");
        assert_eq!(cmd.get_str("validationLevel").unwrap(), "strict");
        let validator = cmd.get_document("validator").unwrap();
        assert!(validator.contains_key("$jsonSchema"));
    }

    #[test]
    fn test_collmod_command_first_key_is_command_name() {
        let cmd = collmod_command("products", Document::new());
        assert_eq!(cmd.keys().next().map(String::as_str), Some("collMod"));
    }
}
