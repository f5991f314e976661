use std::io::Read;
use std::path::Path;

use bson::{Bson, Document};
use csv::{ReaderBuilder, StringRecord};

use crate::error::{CatalogError, Result};
use crate::models::{Product, CATEGORIES, DESCRIPTION, PRICE, PRODUCT_NAME, QUANTITY, RESERVED_FIELDS};

pub const REQUIRED_COLUMNS: [&str; 5] = [PRODUCT_NAME, DESCRIPTION, PRICE, QUANTITY, CATEGORIES];

/// An uploaded tabular file
#[derive(Debug, Clone)]
pub struct CsvFile {
    pub name: String,
    pub content: Vec<u8>,
}

impl CsvFile {
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self { name: name.into(), content: content.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedFile {
    pub name: String,
    pub reason: String,
}

/// Outcome of ingesting a set of files: every accepted file contributes all
/// of its rows to `products`, every other file is listed in `rejected`.
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    pub products: Vec<Product>,
    pub accepted: Vec<String>,
    pub rejected: Vec<RejectedFile>,
}

impl IngestReport {
    pub fn products_ready(&self) -> usize {
        self.products.len()
    }

    pub fn rejected_names(&self) -> Vec<&str> {
        self.rejected.iter().map(|r| r.name.as_str()).collect()
    }
}

/// Column positions of the required fields in one file's header
struct ColumnIndex {
    name: usize,
    description: usize,
    price: usize,
    quantity: usize,
    categories: usize,
}

pub struct CsvHandler {
    delimiter: u8,
}

impl Default for CsvHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl CsvHandler {
    pub fn new() -> Self {
        Self { delimiter: b',' }
    }

    /// Single-byte field separator, e.g. `b'\t'`
    pub fn with_delimiter(delimiter: u8) -> Self {
        Self { delimiter }
    }

    /// Parse one file into normalized products.
    ///
    /// Returns `Ok(None)` when a required column is absent and an error when a
    /// `price` or `quantity` cell cannot be coerced.
    pub fn parse_products<R: Read>(&self, reader: R) -> Result<Option<Vec<Product>>> {
        match self.parse_checked(reader) {
            Ok(products) => Ok(Some(products)),
            Err(CatalogError::MissingColumns(missing)) => {
                tracing::debug!(missing = ?missing, "CSV is missing required columns");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Like [`Self::parse_products`], but a missing column is an error naming the columns.
    /// Headers that would land on `_id` or the legacy `category` field fail the file.
    pub fn parse_checked<R: Read>(&self, reader: R) -> Result<Vec<Product>> {
        let mut reader = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers = reader.headers()?.clone();
        let columns = locate_columns(&headers).map_err(CatalogError::MissingColumns)?;
        let reserved: Vec<String> = headers
            .iter()
            .filter(|h| RESERVED_FIELDS.contains(h))
            .map(str::to_string)
            .collect();
        if !reserved.is_empty() {
            return Err(CatalogError::ReservedColumns(reserved));
        }

        let mut products = Vec::new();
        for (i, result) in reader.records().enumerate() {
            let record = result?;
            products.push(self.normalize_row(i + 1, &headers, &columns, &record)?);
        }

        tracing::debug!(record_count = products.len(), "Parsed CSV data");
        Ok(products)
    }

    fn normalize_row(
        &self,
        row: usize,
        headers: &StringRecord,
        columns: &ColumnIndex,
        record: &StringRecord,
    ) -> Result<Product> {
        let cell = |idx: usize| record.get(idx).unwrap_or("");

        let mut extra = Document::new();
        for (idx, header) in headers.iter().enumerate() {
            if !REQUIRED_COLUMNS.contains(&header) {
                extra.insert(header.to_string(), Bson::String(cell(idx).to_string()));
            }
        }

        Ok(Product {
            id: None,
            product_name: cell(columns.name).to_string(),
            description: cell(columns.description).to_string(),
            price: coerce_price(row, cell(columns.price))?,
            quantity: coerce_quantity(row, cell(columns.quantity))?,
            categories: split_categories(cell(columns.categories)),
            extra,
        })
    }

    /// Ingest each file independently; one bad file never blocks the others
    pub fn ingest_files(&self, files: Vec<CsvFile>) -> IngestReport {
        let mut report = IngestReport::default();

        for file in files {
            let reason = match self.parse_checked(file.content.as_slice()) {
                Ok(products) if !products.is_empty() => {
                    tracing::info!(file = %file.name, records = products.len(), "File successfully processed");
                    report.products.extend(products);
                    report.accepted.push(file.name);
                    continue;
                }
                Ok(_) => "contains no product rows".to_string(),
                Err(e) => e.to_string(),
            };

            tracing::warn!(file = %file.name, %reason, "Skipping file");
            report.rejected.push(RejectedFile { name: file.name, reason });
        }

        report
    }
}

fn locate_columns(headers: &StringRecord) -> std::result::Result<ColumnIndex, Vec<String>> {
    let position = |column: &str| headers.iter().position(|h| h == column);
    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|c| position(c).is_none())
        .map(|c| c.to_string())
        .collect();

    match (
        position(PRODUCT_NAME),
        position(DESCRIPTION),
        position(PRICE),
        position(QUANTITY),
        position(CATEGORIES),
    ) {
        (Some(name), Some(description), Some(price), Some(quantity), Some(categories)) => Ok(ColumnIndex {
            name,
            description,
            price,
            quantity,
            categories,
        }),
        _ => Err(missing),
    }
}

fn coerce_price(row: usize, raw: &str) -> Result<f64> {
    raw.trim().parse::<f64>().map_err(|_| CatalogError::Coercion {
        row,
        column: PRICE,
        value: raw.to_string(),
        expected: "a number",
    })
}

/// Integral text, or decimal text truncated toward zero
fn coerce_quantity(row: usize, raw: &str) -> Result<i64> {
    let text = raw.trim();
    if let Ok(v) = text.parse::<i64>() {
        return Ok(v);
    }
    match text.parse::<f64>() {
        Ok(v) if v.is_finite() && v.abs() < i64::MAX as f64 => Ok(v.trunc() as i64),
        _ => Err(CatalogError::Coercion {
            row,
            column: QUANTITY,
            value: raw.to_string(),
            expected: "an integer",
        }),
    }
}

/// Split on commas and trim each label; empty labels are kept
pub fn split_categories(raw: &str) -> Vec<String> {
    raw.split(',').map(|c| c.trim().to_string()).collect()
}

/// Load files from disk, naming each by its file name
pub fn read_csv_files<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<CsvFile>> {
    paths
        .iter()
        .map(|path| {
            let path = path.as_ref();
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            Ok(CsvFile::new(name, std::fs::read(path)?))
        })
        .collect()
}
