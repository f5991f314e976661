use async_graphql::{Context, EmptySubscription, Object, Result, Schema};

use crate::handlers::{CsvFile, CsvHandler, IngestReport};
use crate::models::{
    CsvFileInput, ProductFilter, ProductGraphQL, RejectedFileGraphQL, UploadOutcome, UploadPreview, ID,
};
use crate::service::CatalogService;

impl From<CsvFileInput> for CsvFile {
    fn from(input: CsvFileInput) -> Self {
        CsvFile::new(input.name, input.content.into_bytes())
    }
}

impl From<&IngestReport> for UploadPreview {
    fn from(report: &IngestReport) -> Self {
        Self {
            accepted_files: report.accepted.clone(),
            rejected_files: report
                .rejected
                .iter()
                .map(|r| RejectedFileGraphQL {
                    name: r.name.clone(),
                    reason: r.reason.clone(),
                })
                .collect(),
            products_ready: saturating_count(report.products_ready()),
        }
    }
}

/// Counts beyond `i64::MAX` are reported as `i64::MAX`
fn saturating_count<T: TryInto<i64>>(count: T) -> i64 {
    count.try_into().unwrap_or(i64::MAX)
}

fn ingest(files: Vec<CsvFileInput>) -> IngestReport {
    CsvHandler::new().ingest_files(files.into_iter().map(CsvFile::from).collect())
}

fn non_blank<'a>(value: &'a str, what: &str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(async_graphql::Error::new(format!("{} must not be empty", what)));
    }
    Ok(trimmed)
}

pub struct Query;

#[Object]
impl Query {
    /// Registered category names
    async fn categories(&self, ctx: &Context<'_>) -> Result<Vec<String>> {
        let service = ctx.data::<CatalogService>()?;
        service
            .list_categories()
            .await
            .map_err(|e| async_graphql::Error::new(e.to_string()))
    }

    /// Distinct labels carried by stored products, sorted
    async fn product_categories(&self, ctx: &Context<'_>) -> Result<Vec<String>> {
        let service = ctx.data::<CatalogService>()?;
        service
            .product_categories()
            .await
            .map_err(|e| async_graphql::Error::new(e.to_string()))
    }

    /// Products in any of `categories`, or every product when omitted
    async fn products(&self, ctx: &Context<'_>, categories: Option<Vec<String>>) -> Result<Vec<ProductGraphQL>> {
        let service = ctx.data::<CatalogService>()?;
        let filter = ProductFilter::in_categories(categories.unwrap_or_default());
        let products = service
            .find_products(&filter)
            .await
            .map_err(|e| async_graphql::Error::new(e.to_string()))?;
        Ok(products.into_iter().map(ProductGraphQL::from).collect())
    }

    async fn product(&self, ctx: &Context<'_>, id: ID) -> Result<Option<ProductGraphQL>> {
        let service = ctx.data::<CatalogService>()?;
        let product = service
            .find_product(id.into())
            .await
            .map_err(|e| async_graphql::Error::new(e.to_string()))?;
        Ok(product.map(ProductGraphQL::from))
    }

    async fn products_count(&self, ctx: &Context<'_>) -> Result<i64> {
        let service = ctx.data::<CatalogService>()?;
        let count = service
            .count_products()
            .await
            .map_err(|e| async_graphql::Error::new(e.to_string()))?;
        i64::try_from(count)
            .map_err(|_| async_graphql::Error::new(format!("product count {} is out of range", count)))
    }

    /// Blank terms match nothing
    async fn search_products(&self, ctx: &Context<'_>, term: String) -> Result<Vec<ProductGraphQL>> {
        let term = term.trim();
        if term.is_empty() {
            return Ok(Vec::new());
        }
        let service = ctx.data::<CatalogService>()?;
        let products = service
            .search_products(term)
            .await
            .map_err(|e| async_graphql::Error::new(e.to_string()))?;
        Ok(products.into_iter().map(ProductGraphQL::from).collect())
    }

    /// Validate and normalize files without writing anything
    async fn preview_upload(&self, files: Vec<CsvFileInput>) -> UploadPreview {
        UploadPreview::from(&ingest(files))
    }
}

pub struct Mutation;

#[Object]
impl Mutation {
    /// Returns false when the name was already registered
    async fn add_category(&self, ctx: &Context<'_>, name: String) -> Result<bool> {
        let name = non_blank(&name, "Category name")?;
        let service = ctx.data::<CatalogService>()?;
        service
            .add_category(name)
            .await
            .map_err(|e| async_graphql::Error::new(e.to_string()))
    }

    /// Ingest the files and insert every accepted row in one batch. A storage
    /// rejection is reported in `error` with nothing inserted.
    async fn upload_products(&self, ctx: &Context<'_>, files: Vec<CsvFileInput>) -> Result<UploadOutcome> {
        let service = ctx.data::<CatalogService>()?;
        let report = ingest(files);
        let preview = UploadPreview::from(&report);

        if report.products.is_empty() {
            return Ok(UploadOutcome {
                preview,
                inserted: 0,
                error: Some("No valid product rows to upload".to_string()),
            });
        }

        match service.upload(&report).await {
            Ok(inserted) => Ok(UploadOutcome {
                preview,
                inserted: saturating_count(inserted),
                error: None,
            }),
            Err(e) => Ok(UploadOutcome {
                preview,
                inserted: 0,
                error: Some(e.to_string()),
            }),
        }
    }

    /// False when the product does not exist or already had only this category
    async fn update_product_category(&self, ctx: &Context<'_>, id: ID, category: String) -> Result<bool> {
        let category = non_blank(&category, "Category")?;
        let service = ctx.data::<CatalogService>()?;
        service
            .update_product_category(id.into(), category)
            .await
            .map_err(|e| async_graphql::Error::new(e.to_string()))
    }
}

pub type CatalogSchema = Schema<Query, Mutation, EmptySubscription>;

pub fn create_schema(service: CatalogService) -> CatalogSchema {
    Schema::build(Query, Mutation, EmptySubscription)
        .data(service)
        .finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Product;

    #[test]
    fn test_counts_saturate_instead_of_wrapping() {
        assert_eq!(saturating_count(3usize), 3);
        assert_eq!(saturating_count(u64::MAX), i64::MAX);
        assert_eq!(saturating_count(i64::MAX as u64 + 1), i64::MAX);
    }

    #[test]
    fn test_preview_counts_ready_products() {
        let report = IngestReport {
            products: vec![Product::new("Widget", "d", 1.0, 1, vec!["a".to_string()]); 3],
            accepted: vec!["batch.csv".to_string()],
            ..Default::default()
        };
        let preview = UploadPreview::from(&report);
        assert_eq!(preview.products_ready, 3);
        assert_eq!(preview.accepted_files, vec!["batch.csv"]);
    }
}
