#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("BSON serialization error: {0}")]
    Bson(#[from] bson::ser::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Reserved column names: {}", .0.join(", "))]
    ReservedColumns(Vec<String>),

    #[error("Row {row}: could not convert {column} value '{value}' to {expected}")]
    Coercion {
        row: usize,
        column: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("Document failed validation: record {index}: {}", .reasons.join("; "))]
    SchemaViolation { index: usize, reasons: Vec<String> },

    #[error("Invalid stored document: {0}")]
    InvalidDocument(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, CatalogError>;
