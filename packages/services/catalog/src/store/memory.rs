//! In-memory catalog store for tests and dry-run imports.
//!
//! Mirrors the MongoDB store: schema rules are checked for the whole batch
//! before anything is written, ids are assigned on insert, and search uses
//! the same escaped case-insensitive pattern.

use std::collections::BTreeSet;

use async_trait::async_trait;
use bson::oid::ObjectId;
use regex::{Regex, RegexBuilder};
use tokio::sync::RwLock;

use super::{preflight, CategoryStore, ProductStore};
use crate::error::{CatalogError, Result};
use crate::models::{Category, Product, ProductFilter};

#[derive(Default)]
pub struct MemoryCatalogStore {
    categories: RwLock<Vec<Category>>,
    products: RwLock<Vec<Product>>,
}

impl MemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed stored products as-is, bypassing schema checks
    pub async fn with_products(self, products: Vec<Product>) -> Self {
        self.products.write().await.extend(products.into_iter().map(|mut p| {
            p.id.get_or_insert_with(ObjectId::new);
            p
        }));
        self
    }
}

fn search_pattern(term: &str) -> Result<Regex> {
    RegexBuilder::new(&regex::escape(term))
        .case_insensitive(true)
        .build()
        .map_err(|e| CatalogError::InvalidInput(format!("search term: {}", e)))
}

#[async_trait]
impl CategoryStore for MemoryCatalogStore {
    async fn list_categories(&self) -> Result<Vec<String>> {
        Ok(self.categories.read().await.iter().map(|c| c.name.clone()).collect())
    }

    async fn category_exists(&self, name: &str) -> Result<bool> {
        Ok(self.categories.read().await.iter().any(|c| c.name == name))
    }

    async fn insert_category(&self, name: &str) -> Result<()> {
        self.categories.write().await.push(Category {
            id: Some(ObjectId::new()),
            name: name.to_string(),
        });
        Ok(())
    }
}

#[async_trait]
impl ProductStore for MemoryCatalogStore {
    async fn insert_products(&self, products: &[Product]) -> Result<usize> {
        preflight(products)?;

        let mut stored = self.products.write().await;
        for product in products {
            let mut product = product.clone();
            product.id.get_or_insert_with(ObjectId::new);
            stored.push(product);
        }
        Ok(products.len())
    }

    async fn find_products(&self, filter: &ProductFilter) -> Result<Vec<Product>> {
        Ok(self
            .products
            .read()
            .await
            .iter()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect())
    }

    async fn find_product(&self, id: ObjectId) -> Result<Option<Product>> {
        Ok(self.products.read().await.iter().find(|p| p.id == Some(id)).cloned())
    }

    async fn search_products(&self, term: &str) -> Result<Vec<Product>> {
        let pattern = search_pattern(term)?;
        Ok(self
            .products
            .read()
            .await
            .iter()
            .filter(|p| pattern.is_match(&p.product_name) || pattern.is_match(&p.description) || p.has_category(term))
            .cloned()
            .collect())
    }

    async fn set_product_categories(&self, id: ObjectId, categories: Vec<String>) -> Result<bool> {
        let mut stored = self.products.write().await;
        match stored.iter_mut().find(|p| p.id == Some(id)) {
            Some(product) if product.categories != categories => {
                product.categories = categories;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn distinct_categories(&self) -> Result<Vec<String>> {
        let labels: BTreeSet<String> = self
            .products
            .read()
            .await
            .iter()
            .flat_map(|p| p.categories.iter().cloned())
            .collect();
        Ok(labels.into_iter().collect())
    }

    async fn count_products(&self) -> Result<u64> {
        Ok(self.products.read().await.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(name: &str, description: &str, categories: &[&str]) -> Product {
        Product::new(name, description, 10.0, 5, categories.iter().map(|c| c.to_string()).collect())
    }

    async fn seeded() -> MemoryCatalogStore {
        MemoryCatalogStore::new()
            .with_products(vec![
                product("Widget", "a small part", &["a", "b"]),
                product("Lamp", "desk lighting", &["Lighting"]),
                product("Kettle", "boils water (1.5L)", &["Kitchen"]),
            ])
            .await
    }

    #[tokio::test]
    async fn test_insert_assigns_ids() {
        let store = MemoryCatalogStore::new();
        let inserted = store.insert_products(&[product("Widget", "d", &["a"])]).await.unwrap();
        assert_eq!(inserted, 1);

        let all = store.find_products(&ProductFilter::default()).await.unwrap();
        assert!(all[0].id.is_some());
    }

    #[tokio::test]
    async fn test_bad_record_rejects_whole_batch() {
        let store = MemoryCatalogStore::new();
        let mut bad = product("Gadget", "d", &["a"]);
        bad.price = -5.0;

        let err = store
            .insert_products(&[product("Widget", "d", &["a"]), bad, product("Lamp", "d", &[])])
            .await
            .unwrap_err();

        assert!(matches!(err, CatalogError::SchemaViolation { index: 1, .. }));
        assert_eq!(store.count_products().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive_literal() {
        let store = seeded().await;

        let hits = store.search_products("wid").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].product_name, "Widget");

        assert_eq!(store.search_products("LIGHTING").await.unwrap().len(), 1);
        assert_eq!(store.search_products("(1.5L)").await.unwrap().len(), 1);
        assert!(store.search_products("zzz").await.unwrap().is_empty());
        assert!(store.search_products(".*").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_matches_exact_category() {
        let store = seeded().await;
        let hits = store.search_products("Kitchen").await.unwrap();
        assert_eq!(hits[0].product_name, "Kettle");

        // category membership is exact, so a prefix only matches through name/description
        assert!(store.search_products("Kitch").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_set_categories_reports_modification() {
        let store = seeded().await;
        let id = store.search_products("Lamp").await.unwrap()[0].id.unwrap();

        assert!(store.set_product_categories(id, vec!["Home".to_string()]).await.unwrap());
        assert!(!store.set_product_categories(id, vec!["Home".to_string()]).await.unwrap());
        assert!(!store.set_product_categories(ObjectId::new(), vec!["Home".to_string()]).await.unwrap());

        let lamp = store.find_product(id).await.unwrap().unwrap();
        assert_eq!(lamp.categories, vec!["Home".to_string()]);
    }

    #[tokio::test]
    async fn test_distinct_categories_sorted() {
        let store = seeded().await;
        assert_eq!(
            store.distinct_categories().await.unwrap(),
            vec!["Kitchen", "Lighting", "a", "b"]
        );
    }

    #[tokio::test]
    async fn test_category_registry() {
        let store = MemoryCatalogStore::new();
        assert!(!store.category_exists("X").await.unwrap());
        store.insert_category("X").await.unwrap();
        assert!(store.category_exists("X").await.unwrap());
        assert!(!store.category_exists("x").await.unwrap());
        assert_eq!(store.list_categories().await.unwrap(), vec!["X"]);
    }
}
