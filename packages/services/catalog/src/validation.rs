//! Declared constraints for the `products` and `categories` collections.
//!
//! The `$jsonSchema` documents are installed as collection validators by the
//! first migration. [`check_product`] evaluates the same rules in-process so a
//! batch can be rejected as a whole before anything reaches the database.

use bson::{doc, Document};

use crate::models::{Product, CATEGORIES, DESCRIPTION, PRICE, PRODUCT_NAME, QUANTITY};

pub const PRODUCTS_COLLECTION: &str = "products";
pub const CATEGORIES_COLLECTION: &str = "categories";

const NAME_RULE: &str = "product_name must be a non-empty string and is required";
const PRICE_RULE: &str = "price must be a non-negative number and is required";
const QUANTITY_RULE: &str = "quantity must be a non-negative integer and is required";
const CATEGORY_NAME_RULE: &str = "name must be a string and is required";

pub fn product_schema() -> Document {
    doc! {
        "bsonType": "object",
        "required": [PRODUCT_NAME, DESCRIPTION, PRICE, QUANTITY, CATEGORIES],
        "properties": {
            PRODUCT_NAME: {
                "bsonType": "string",
                "minLength": 1,
                "description": NAME_RULE,
            },
            DESCRIPTION: {
                "bsonType": "string",
                "description": "description must be a string and is required",
            },
            PRICE: {
                "bsonType": "number",
                "minimum": 0,
                "description": PRICE_RULE,
            },
            QUANTITY: {
                "bsonType": "int",
                "minimum": 0,
                "description": QUANTITY_RULE,
            },
            CATEGORIES: {
                "bsonType": "array",
                "items": { "bsonType": "string" },
                "description": "categories must be an array of strings and is required",
            },
        }
    }
}

pub fn category_schema() -> Document {
    doc! {
        "bsonType": "object",
        "required": ["name"],
        "properties": {
            "name": {
                "bsonType": "string",
                "description": CATEGORY_NAME_RULE,
            }
        }
    }
}

/// Violations of [`product_schema`], empty when the record is acceptable
pub fn check_product(product: &Product) -> Vec<String> {
    let mut reasons = Vec::new();
    if product.product_name.is_empty() {
        reasons.push(NAME_RULE.to_string());
    }
    if product.price.is_nan() || product.price < 0.0 {
        reasons.push(PRICE_RULE.to_string());
    }
    if product.quantity < 0 || i32::try_from(product.quantity).is_err() {
        reasons.push(QUANTITY_RULE.to_string());
    }
    reasons
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(name: &str, price: f64, quantity: i64) -> Product {
        Product::new(name, "desc", price, quantity, vec!["a".to_string()])
    }

    #[test]
    fn test_valid_product_has_no_violations() {
        assert!(check_product(&product("Widget", 0.0, 0)).is_empty());
    }

    #[test]
    fn test_each_rule_reported() {
        assert_eq!(check_product(&product("", 1.0, 1)), vec![NAME_RULE.to_string()]);
        assert_eq!(check_product(&product("W", -0.01, 1)), vec![PRICE_RULE.to_string()]);
        assert_eq!(check_product(&product("W", f64::NAN, 1)), vec![PRICE_RULE.to_string()]);
        assert_eq!(check_product(&product("W", 1.0, -1)), vec![QUANTITY_RULE.to_string()]);
        assert_eq!(
            check_product(&product("W", 1.0, i64::from(i32::MAX) + 1)),
            vec![QUANTITY_RULE.to_string()]
        );
    }

    #[test]
    fn test_multiple_violations_accumulate() {
        assert_eq!(check_product(&product("", -1.0, -1)).len(), 3);
    }

    #[test]
    fn test_product_schema_requires_all_columns() {
        let schema = product_schema();
        let required: Vec<&str> = schema
            .get_array("required")
            .unwrap()
            .iter()
            .filter_map(|b| b.as_str())
            .collect();
        assert_eq!(required, vec!["product_name", "description", "price", "quantity", "categories"]);

        let price = schema.get_document("properties").unwrap().get_document("price").unwrap();
        assert_eq!(price.get_i32("minimum").unwrap(), 0);
    }

    #[test]
    fn test_category_schema_requires_name() {
        let schema = category_schema();
        assert_eq!(schema.get_array("required").unwrap().len(), 1);
    }
}
