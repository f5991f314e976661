use std::sync::Arc;

use bson::oid::ObjectId;

use crate::error::Result;
use crate::handlers::IngestReport;
use crate::models::{Product, ProductFilter};
use crate::store::{CategoryStore, ProductStore};

/// Category registry, bulk upload and recategorization over injected stores
#[derive(Clone)]
pub struct CatalogService {
    categories: Arc<dyn CategoryStore>,
    products: Arc<dyn ProductStore>,
}

impl CatalogService {
    pub fn new(categories: Arc<dyn CategoryStore>, products: Arc<dyn ProductStore>) -> Self {
        Self { categories, products }
    }

    /// Build over a single backend implementing both stores
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: CategoryStore + ProductStore + 'static,
    {
        Self {
            categories: store.clone(),
            products: store,
        }
    }

    // Category registry

    pub async fn list_categories(&self) -> Result<Vec<String>> {
        self.categories.list_categories().await
    }

    /// Register `name` unless an identical name exists. Returns true when inserted.
    ///
    /// The existence check and the insert are separate round-trips; two
    /// concurrent callers can both insert the same name.
    pub async fn add_category(&self, name: &str) -> Result<bool> {
        if self.categories.category_exists(name).await? {
            tracing::debug!(category = name, "Category already registered");
            return Ok(false);
        }
        self.categories.insert_category(name).await?;
        tracing::info!(category = name, "Category registered");
        Ok(true)
    }

    // Products

    /// Persist a batch all-or-nothing. Returns the number inserted.
    pub async fn save_products(&self, products: &[Product]) -> Result<usize> {
        match self.products.insert_products(products).await {
            Ok(inserted) => {
                tracing::info!(inserted, "Products saved");
                Ok(inserted)
            }
            Err(e) => {
                tracing::error!(batch = products.len(), error = %e, "Product batch rejected");
                Err(e)
            }
        }
    }

    /// Register every category the batch references, then insert the batch.
    ///
    /// Categories registered here stay registered if the insert fails.
    pub async fn upload(&self, report: &IngestReport) -> Result<usize> {
        for category in referenced_categories(&report.products) {
            self.add_category(category).await?;
        }
        self.save_products(&report.products).await
    }

    pub async fn find_products(&self, filter: &ProductFilter) -> Result<Vec<Product>> {
        self.products.find_products(filter).await
    }

    pub async fn find_product(&self, id: ObjectId) -> Result<Option<Product>> {
        self.products.find_product(id).await
    }

    pub async fn search_products(&self, term: &str) -> Result<Vec<Product>> {
        let products = self.products.search_products(term).await?;
        tracing::debug!(term, matches = products.len(), "Product search");
        Ok(products)
    }

    /// Make `category` the product's only category. False when the id is
    /// unknown or the product already had exactly that category.
    pub async fn update_product_category(&self, id: ObjectId, category: &str) -> Result<bool> {
        let modified = self
            .products
            .set_product_categories(id, vec![category.to_string()])
            .await?;
        if modified {
            tracing::info!(product = %id, category, "Product recategorized");
        } else {
            tracing::warn!(product = %id, category, "Product not recategorized");
        }
        Ok(modified)
    }

    /// Labels actually carried by products, sorted
    pub async fn product_categories(&self) -> Result<Vec<String>> {
        self.products.distinct_categories().await
    }

    pub async fn products_in_category(&self, category: &str) -> Result<Vec<Product>> {
        self.products.find_products(&ProductFilter::in_categories([category])).await
    }

    pub async fn count_products(&self) -> Result<u64> {
        self.products.count_products().await
    }
}

/// Distinct labels in first-seen order
fn referenced_categories(products: &[Product]) -> Vec<&str> {
    let mut seen: Vec<&str> = Vec::new();
    for label in products.iter().flat_map(|p| p.categories.iter()) {
        if !seen.contains(&label.as_str()) {
            seen.push(label);
        }
    }
    seen
}
