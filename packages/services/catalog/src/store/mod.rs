//! Storage access for products and categories.
//!
//! [`CategoryStore`] and [`ProductStore`] are implemented by
//! [`MongoCatalogStore`] for the running service and by
//! [`MemoryCatalogStore`] for tests and dry runs. Both enforce the rules in
//! [`crate::validation`] so a batch with one bad record persists nothing.

pub mod memory;
pub mod mongo;

use async_trait::async_trait;
use bson::oid::ObjectId;

use crate::error::{CatalogError, Result};
use crate::models::{Product, ProductFilter};
use crate::validation::check_product;

pub use memory::MemoryCatalogStore;
pub use mongo::MongoCatalogStore;

#[async_trait]
pub trait CategoryStore: Send + Sync {
    /// Every registered name, in storage order
    async fn list_categories(&self) -> Result<Vec<String>>;

    /// Exact, case-sensitive lookup
    async fn category_exists(&self, name: &str) -> Result<bool>;

    /// Unconditional insert; callers check [`Self::category_exists`] first
    async fn insert_category(&self, name: &str) -> Result<()>;
}

#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Insert the whole batch or nothing. Returns the number inserted.
    async fn insert_products(&self, products: &[Product]) -> Result<usize>;

    async fn find_products(&self, filter: &ProductFilter) -> Result<Vec<Product>>;

    async fn find_product(&self, id: ObjectId) -> Result<Option<Product>>;

    /// Case-insensitive literal match on name or description, or exact
    /// membership of `term` in the category list
    async fn search_products(&self, term: &str) -> Result<Vec<Product>>;

    /// Replace the category list of one product. Returns whether a record changed.
    async fn set_product_categories(&self, id: ObjectId, categories: Vec<String>) -> Result<bool>;

    /// Distinct category labels carried by products, sorted
    async fn distinct_categories(&self) -> Result<Vec<String>>;

    async fn count_products(&self) -> Result<u64>;
}

/// Reject the batch at the first record that breaks the product schema
pub(crate) fn preflight(products: &[Product]) -> Result<()> {
    for (index, product) in products.iter().enumerate() {
        let reasons = check_product(product);
        if !reasons.is_empty() {
            return Err(CatalogError::SchemaViolation { index, reasons });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preflight_reports_first_bad_index() {
        let good = Product::new("Widget", "desc", 1.0, 1, vec![]);
        let bad = Product::new("Gadget", "desc", -1.0, 1, vec![]);

        assert!(preflight(&[good.clone()]).is_ok());
        match preflight(&[good, bad]) {
            Err(CatalogError::SchemaViolation { index, reasons }) => {
                assert_eq!(index, 1);
                assert_eq!(reasons.len(), 1);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
