//! Product catalog service: CSV bulk upload, a category registry and
//! recategorization over MongoDB, exposed through GraphQL and a CLI.

pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod migrations;
pub mod models;
pub mod schema;
pub mod service;
pub mod store;
pub mod validation;

pub use config::{Config, LogFormat};
pub use error::{CatalogError, Result};
pub use handlers::{CsvFile, CsvHandler, IngestReport, RejectedFile};
pub use models::{Category, Product, ProductFilter};
pub use schema::{create_schema, CatalogSchema};
pub use service::CatalogService;
pub use store::{CategoryStore, MemoryCatalogStore, MongoCatalogStore, ProductStore};
