use bson::Document;
use mongodb::{Client, Collection, Database};

use crate::error::Result;
use crate::models::Category;
use crate::validation::{CATEGORIES_COLLECTION, PRODUCTS_COLLECTION};

/// Process-wide MongoDB handle, created once at startup and passed to the
/// components that need it
#[derive(Clone)]
pub struct DatabaseManager {
    client: Client,
    database: Database,
    pub products: Collection<Document>,
    pub categories: Collection<Category>,
}

impl DatabaseManager {
    pub async fn new(mongodb_uri: &str, database_name: &str) -> Result<Self> {
        let client = Client::with_uri_str(mongodb_uri).await?;
        let database = client.database(database_name);

        let products = database.collection::<Document>(PRODUCTS_COLLECTION);
        let categories = database.collection::<Category>(CATEGORIES_COLLECTION);

        tracing::debug!(database = database_name, "MongoDB client created");

        Ok(Self {
            client,
            database,
            products,
            categories,
        })
    }

    /// Round-trip to the server so startup fails fast on a bad URI
    pub async fn ping(&self) -> Result<()> {
        self.database.run_command(bson::doc! { "ping": 1 }, None).await?;
        Ok(())
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Underlying database, used by migrations
    pub fn database(&self) -> &Database {
        &self.database
    }
}
