use async_graphql::{InputObject, Scalar, ScalarType, SimpleObject, Value};
use bson::oid::ObjectId;
use bson::{Bson, Document};
use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, Result};

pub const PRODUCT_NAME: &str = "product_name";
pub const DESCRIPTION: &str = "description";
pub const PRICE: &str = "price";
pub const QUANTITY: &str = "quantity";
pub const CATEGORIES: &str = "categories";
/// Scalar field written by older tooling; read as a one-element `categories`
pub const LEGACY_CATEGORY: &str = "category";
/// Field names an extra column may not use
pub const RESERVED_FIELDS: [&str; 2] = ["_id", LEGACY_CATEGORY];

/// A product record. `id` is assigned by the store on insert.
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub id: Option<ObjectId>,
    pub product_name: String,
    pub description: String,
    pub price: f64,
    pub quantity: i64,
    pub categories: Vec<String>,
    /// Columns beyond the required five, kept verbatim
    pub extra: Document,
}

impl Product {
    pub fn new(
        product_name: impl Into<String>,
        description: impl Into<String>,
        price: f64,
        quantity: i64,
        categories: Vec<String>,
    ) -> Self {
        Self {
            id: None,
            product_name: product_name.into(),
            description: description.into(),
            price,
            quantity,
            categories,
            extra: Document::new(),
        }
    }

    pub fn has_category(&self, category: &str) -> bool {
        self.categories.iter().any(|c| c == category)
    }

    pub fn to_document(&self) -> Document {
        let mut doc = Document::new();
        if let Some(id) = self.id {
            doc.insert("_id", id);
        }
        doc.insert(PRODUCT_NAME, self.product_name.as_str());
        doc.insert(DESCRIPTION, self.description.as_str());
        doc.insert(PRICE, self.price);
        // The validator wants a 32-bit int; wider values are left for it to reject
        let quantity = i32::try_from(self.quantity).map(Bson::Int32).unwrap_or(Bson::Int64(self.quantity));
        doc.insert(QUANTITY, quantity);
        doc.insert(CATEGORIES, self.categories.clone());
        for (key, value) in &self.extra {
            if !doc.contains_key(key) && !RESERVED_FIELDS.contains(&key.as_str()) {
                doc.insert(key.clone(), value.clone());
            }
        }
        doc
    }

    pub fn from_document(mut doc: Document) -> Result<Self> {
        let id = match doc.remove("_id") {
            Some(Bson::ObjectId(oid)) => Some(oid),
            Some(other) => return Err(CatalogError::InvalidDocument(format!("_id is not an ObjectId: {}", other))),
            None => None,
        };

        let product_name = take_string(&mut doc, PRODUCT_NAME)?;
        let description = take_string(&mut doc, DESCRIPTION)?;

        let price = match doc.remove(PRICE) {
            Some(Bson::Double(v)) => v,
            Some(Bson::Int32(v)) => v as f64,
            Some(Bson::Int64(v)) => v as f64,
            other => return Err(invalid_field(PRICE, other)),
        };

        let quantity = match doc.remove(QUANTITY) {
            Some(Bson::Int32(v)) => v as i64,
            Some(Bson::Int64(v)) => v,
            Some(Bson::Double(v)) if v.fract() == 0.0 => v as i64,
            other => return Err(invalid_field(QUANTITY, other)),
        };

        let legacy = doc.remove(LEGACY_CATEGORY);
        let categories = match (doc.remove(CATEGORIES), legacy) {
            (Some(Bson::Array(items)), _) => items
                .into_iter()
                .map(|item| match item {
                    Bson::String(s) => Ok(s),
                    other => Err(invalid_field(CATEGORIES, Some(other))),
                })
                .collect::<Result<Vec<_>>>()?,
            (None, Some(Bson::String(category))) => vec![category],
            (None, None) => Vec::new(),
            (other, _) => return Err(invalid_field(CATEGORIES, other)),
        };

        Ok(Self {
            id,
            product_name,
            description,
            price,
            quantity,
            categories,
            extra: doc,
        })
    }

    /// JSON view of the record as shown to operators
    pub fn to_json(&self) -> serde_json::Value {
        let mut doc = self.to_document();
        if let Some(id) = doc.remove("_id").and_then(|id| id.as_object_id()) {
            doc.insert("_id", id.to_hex());
        }
        Bson::Document(doc).into_relaxed_extjson()
    }
}

fn take_string(doc: &mut Document, field: &str) -> Result<String> {
    match doc.remove(field) {
        Some(Bson::String(s)) => Ok(s),
        other => Err(invalid_field(field, other)),
    }
}

fn invalid_field(field: &str, value: Option<Bson>) -> CatalogError {
    match value {
        Some(v) => CatalogError::InvalidDocument(format!("{} has unexpected value {}", field, v)),
        None => CatalogError::InvalidDocument(format!("{} is missing", field)),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
}

impl Category {
    pub fn named(name: impl Into<String>) -> Self {
        Self { id: None, name: name.into() }
    }
}

/// Product listing filter: records carrying any of `categories`, or all
/// records when empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilter {
    pub categories: Vec<String>,
}

impl ProductFilter {
    pub fn in_categories<I, S>(categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { categories: categories.into_iter().map(Into::into).collect() }
    }

    pub fn matches(&self, product: &Product) -> bool {
        self.categories.is_empty() || self.categories.iter().any(|c| product.has_category(c))
    }
}

// Custom scalar for ObjectId
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ID(pub ObjectId);

#[Scalar]
impl ScalarType for ID {
    fn parse(value: Value) -> async_graphql::InputValueResult<Self> {
        if let Value::String(s) = &value {
            Ok(ID(ObjectId::parse_str(s)?))
        } else {
            Err(async_graphql::InputValueError::expected_type(value))
        }
    }

    fn to_value(&self) -> Value {
        Value::String(self.0.to_hex())
    }
}

impl From<ID> for ObjectId {
    fn from(id: ID) -> Self {
        id.0
    }
}

// Extra CSV columns rendered as a JSON object
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JSONObject(pub serde_json::Value);

#[Scalar]
impl ScalarType for JSONObject {
    fn parse(value: Value) -> async_graphql::InputValueResult<Self> {
        match value {
            Value::Object(_) | Value::Null => Ok(JSONObject(value.into_json()?)),
            _ => Err(async_graphql::InputValueError::expected_type(value)),
        }
    }

    fn to_value(&self) -> Value {
        Value::from_json(self.0.clone()).unwrap_or(Value::Null)
    }
}

#[derive(SimpleObject)]
#[graphql(name = "Product")]
pub struct ProductGraphQL {
    pub id: Option<ID>,
    pub product_name: String,
    pub description: String,
    pub price: f64,
    pub quantity: i64,
    pub categories: Vec<String>,
    pub extra: JSONObject,
}

impl From<Product> for ProductGraphQL {
    fn from(product: Product) -> Self {
        Self {
            id: product.id.map(ID),
            extra: JSONObject(Bson::Document(product.extra).into_relaxed_extjson()),
            product_name: product.product_name,
            description: product.description,
            price: product.price,
            quantity: product.quantity,
            categories: product.categories,
        }
    }
}

/// An uploaded CSV file
#[derive(Debug, Clone, InputObject)]
pub struct CsvFileInput {
    pub name: String,
    pub content: String,
}

#[derive(SimpleObject)]
#[graphql(name = "RejectedFile")]
pub struct RejectedFileGraphQL {
    pub name: String,
    pub reason: String,
}

#[derive(SimpleObject)]
pub struct UploadPreview {
    pub accepted_files: Vec<String>,
    pub rejected_files: Vec<RejectedFileGraphQL>,
    pub products_ready: i64,
}

#[derive(SimpleObject)]
pub struct UploadOutcome {
    pub preview: UploadPreview,
    /// Records persisted; zero whenever `error` is set
    pub inserted: i64,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn widget() -> Product {
        Product::new("Widget", "desc", 10.0, 5, vec!["a".to_string(), "b".to_string()])
    }

    #[test]
    fn test_document_round_trip_keeps_extra_columns() {
        let mut product = widget();
        product.extra.insert("sku", "W-1");
        let doc = product.to_document();

        assert_eq!(doc.get(QUANTITY), Some(&Bson::Int32(5)));
        assert_eq!(doc.get_str("sku").unwrap(), "W-1");
        assert_eq!(Product::from_document(doc).unwrap(), product);
    }

    #[test]
    fn test_reserved_extra_keys_are_not_written() {
        let mut product = widget();
        product.extra.insert("_id", "42");
        product.extra.insert(LEGACY_CATEGORY, "Old");
        let doc = product.to_document();

        assert!(!doc.contains_key("_id"));
        assert!(!doc.contains_key(LEGACY_CATEGORY));
        assert_eq!(Product::from_document(doc).unwrap().categories, vec!["a", "b"]);
    }

    #[test]
    fn test_oversized_quantity_is_stored_wide() {
        let mut product = widget();
        product.quantity = i64::from(i32::MAX) + 1;
        assert!(matches!(product.to_document().get(QUANTITY), Some(Bson::Int64(_))));
    }

    #[test]
    fn test_legacy_scalar_category_is_read_as_list() {
        let id = ObjectId::new();
        let doc = doc! {
            "_id": id,
            "product_name": "Lamp",
            "description": "desk lamp",
            "price": 12,
            "quantity": 3_i64,
            "category": "Lighting",
        };
        let product = Product::from_document(doc).unwrap();
        assert_eq!(product.id, Some(id));
        assert_eq!(product.price, 12.0);
        assert_eq!(product.categories, vec!["Lighting".to_string()]);
        assert!(product.extra.is_empty());
    }

    #[test]
    fn test_missing_required_field_is_reported() {
        let err = Product::from_document(doc! { "product_name": "Lamp" }).unwrap_err();
        assert!(err.to_string().contains("description is missing"));
    }

    #[test]
    fn test_json_view_renders_id_as_hex() {
        let mut product = widget();
        let id = ObjectId::new();
        product.id = Some(id);
        let json = product.to_json();
        assert_eq!(json["_id"], serde_json::json!(id.to_hex()));
        assert_eq!(json["categories"], serde_json::json!(["a", "b"]));
        assert_eq!(json["price"], serde_json::json!(10.0));
    }

    #[test]
    fn test_filter_matches_any_category() {
        let product = widget();
        assert!(ProductFilter::default().matches(&product));
        assert!(ProductFilter::in_categories(["x", "b"]).matches(&product));
        assert!(!ProductFilter::in_categories(["x"]).matches(&product));
    }
}
