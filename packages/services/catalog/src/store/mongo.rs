use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::{doc, Bson, Document};
use futures::stream::TryStreamExt;

use super::{preflight, CategoryStore, ProductStore};
use crate::database::DatabaseManager;
use crate::error::Result;
use crate::models::{Category, Product, ProductFilter, CATEGORIES, DESCRIPTION, LEGACY_CATEGORY, PRODUCT_NAME};

#[derive(Clone)]
pub struct MongoCatalogStore {
    db: DatabaseManager,
    transactions: bool,
}

impl MongoCatalogStore {
    pub fn new(db: DatabaseManager) -> Self {
        Self { db, transactions: false }
    }

    /// Run batch inserts inside a multi-document transaction. Needs a replica set.
    pub fn with_transactions(mut self, enabled: bool) -> Self {
        self.transactions = enabled;
        self
    }

    async fn insert_in_transaction(&self, docs: Vec<Document>) -> Result<usize> {
        let mut session = self.db.client().start_session(None).await?;
        session.start_transaction(None).await?;

        match self.db.products.insert_many_with_session(docs, None, &mut session).await {
            Ok(result) => {
                session.commit_transaction().await?;
                Ok(result.inserted_ids.len())
            }
            Err(e) => {
                if let Err(abort) = session.abort_transaction().await {
                    tracing::warn!(error = %abort, "Failed to abort product insert transaction");
                }
                Err(e.into())
            }
        }
    }
}

/// `$or` of a literal case-insensitive pattern on name and description and
/// exact membership of the term in `categories`
pub fn search_filter(term: &str) -> Document {
    let pattern = doc! { "$regex": regex::escape(term), "$options": "i" };
    doc! {
        "$or": [
            { PRODUCT_NAME: pattern.clone() },
            { DESCRIPTION: pattern },
            { CATEGORIES: { "$in": [term] } },
        ]
    }
}

pub fn category_filter(filter: &ProductFilter) -> Document {
    if filter.categories.is_empty() {
        return Document::new();
    }
    doc! { CATEGORIES: { "$in": filter.categories.clone() } }
}

/// Replace the category list and drop any legacy scalar left on the record
pub fn recategorize_update(categories: Vec<String>) -> Document {
    doc! {
        "$set": { CATEGORIES: categories },
        "$unset": { LEGACY_CATEGORY: "" },
    }
}

/// Decode stored documents, skipping any that no longer fit the product shape
fn decode_products(docs: Vec<Document>) -> Vec<Product> {
    docs.into_iter()
        .filter_map(|doc| {
            let id = doc.get_object_id("_id").ok();
            match Product::from_document(doc) {
                Ok(product) => Some(product),
                Err(e) => {
                    tracing::warn!(id = ?id, error = %e, "Skipping malformed product document");
                    None
                }
            }
        })
        .collect()
}

#[async_trait]
impl CategoryStore for MongoCatalogStore {
    async fn list_categories(&self) -> Result<Vec<String>> {
        let cursor = self.db.categories.find(None, None).await?;
        let categories: Vec<Category> = cursor.try_collect().await?;
        Ok(categories.into_iter().map(|c| c.name).collect())
    }

    async fn category_exists(&self, name: &str) -> Result<bool> {
        Ok(self.db.categories.find_one(doc! { "name": name }, None).await?.is_some())
    }

    async fn insert_category(&self, name: &str) -> Result<()> {
        self.db.categories.insert_one(Category::named(name), None).await?;
        Ok(())
    }
}

#[async_trait]
impl ProductStore for MongoCatalogStore {
    async fn insert_products(&self, products: &[Product]) -> Result<usize> {
        if products.is_empty() {
            return Ok(0);
        }
        preflight(products)?;

        let docs: Vec<Document> = products.iter().map(Product::to_document).collect();
        if self.transactions {
            return self.insert_in_transaction(docs).await;
        }
        let result = self.db.products.insert_many(docs, None).await?;
        Ok(result.inserted_ids.len())
    }

    async fn find_products(&self, filter: &ProductFilter) -> Result<Vec<Product>> {
        let cursor = self.db.products.find(category_filter(filter), None).await?;
        Ok(decode_products(cursor.try_collect().await?))
    }

    async fn find_product(&self, id: ObjectId) -> Result<Option<Product>> {
        match self.db.products.find_one(doc! { "_id": id }, None).await? {
            Some(doc) => Ok(Some(Product::from_document(doc)?)),
            None => Ok(None),
        }
    }

    async fn search_products(&self, term: &str) -> Result<Vec<Product>> {
        let cursor = self.db.products.find(search_filter(term), None).await?;
        Ok(decode_products(cursor.try_collect().await?))
    }

    async fn set_product_categories(&self, id: ObjectId, categories: Vec<String>) -> Result<bool> {
        let result = self
            .db
            .products
            .update_one(doc! { "_id": id }, recategorize_update(categories), None)
            .await?;
        Ok(result.modified_count > 0)
    }

    async fn distinct_categories(&self) -> Result<Vec<String>> {
        let values = self.db.products.distinct(CATEGORIES, None, None).await?;
        let mut labels: Vec<String> = values
            .into_iter()
            .filter_map(|v| match v {
                Bson::String(s) => Some(s),
                _ => None,
            })
            .collect();
        labels.sort();
        labels.dedup();
        Ok(labels)
    }

    async fn count_products(&self) -> Result<u64> {
        Ok(self.db.products.count_documents(None, None).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_filter_escapes_term() {
        let filter = search_filter("a+b (x)");
        let clauses = filter.get_array("$or").unwrap();
        assert_eq!(clauses.len(), 3);

        let name = clauses[0].as_document().unwrap().get_document(PRODUCT_NAME).unwrap();
        assert_eq!(name.get_str("$regex").unwrap(), r"a\+b \(x\)");
        assert_eq!(name.get_str("$options").unwrap(), "i");

        let category = clauses[2].as_document().unwrap().get_document(CATEGORIES).unwrap();
        assert_eq!(category.get_array("$in").unwrap(), &vec![Bson::String("a+b (x)".to_string())]);
    }

    #[test]
    fn test_category_filter() {
        assert!(category_filter(&ProductFilter::default()).is_empty());

        let filter = category_filter(&ProductFilter::in_categories(["a", "b"]));
        assert_eq!(filter, doc! { "categories": { "$in": ["a", "b"] } });
    }

    #[test]
    fn test_recategorize_update_replaces_list() {
        let update = recategorize_update(vec!["NewCat".to_string()]);
        assert_eq!(update.get_document("$set").unwrap(), &doc! { "categories": ["NewCat"] });
        assert!(update.get_document("$unset").unwrap().contains_key("category"));
    }

    #[test]
    fn test_malformed_documents_are_skipped() {
        let good = Product::new("Widget", "desc", 1.0, 1, vec!["a".to_string()]).to_document();
        let products = decode_products(vec![good, doc! { "product_name": "broken" }]);
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].product_name, "Widget");
    }
}
