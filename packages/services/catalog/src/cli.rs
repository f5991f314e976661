use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use bson::oid::ObjectId;
use clap::{Parser, Subcommand};
use mongodb_migrator::{MigrationCommand, MigrationConfig, ServiceConfig};

use crate::config::Config;
use crate::handlers::{read_csv_files, CsvHandler, IngestReport};
use crate::migrations::SERVICE_NAME;
use crate::models::{Product, ProductFilter};
use crate::service::CatalogService;

impl ServiceConfig for Config {
    fn mongodb_uri(&self) -> &str {
        &self.mongodb_uri
    }

    fn database_name(&self) -> &str {
        &self.database_name
    }

    fn migration_config(&self) -> MigrationConfig {
        MigrationConfig::for_service(SERVICE_NAME)
    }
}

#[derive(Debug, Parser)]
#[command(name = "catalog-service", version, about = "Product catalog bulk upload and categorization")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    /// The requested command, `serve` when none was given
    pub fn command(self) -> Command {
        self.command.unwrap_or(Command::Serve)
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the GraphQL server
    Serve,
    /// Load products from CSV files
    Import {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Validate and report without writing
        #[arg(long)]
        dry_run: bool,
    },
    /// Manage the category registry
    Categories {
        #[command(subcommand)]
        action: CategoriesCommand,
    },
    /// List products, optionally limited to some categories
    Products {
        #[arg(long = "category")]
        categories: Vec<String>,
    },
    /// Search product names, descriptions and categories
    Search { term: String },
    /// Replace a product's categories with a single category
    Recategorize { id: String, category: String },
    /// Database migrations
    Migrate {
        #[command(subcommand)]
        command: MigrationCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum CategoriesCommand {
    List,
    /// Distinct categories carried by products
    Used,
    Add { name: String },
}

impl Command {
    /// Whether the command only reads files and never needs the database
    pub fn is_offline(&self) -> bool {
        matches!(self, Command::Import { dry_run: true, .. })
    }
}

fn write_products<W: Write>(out: &mut W, products: &[Product]) -> Result<()> {
    let rendered: Vec<serde_json::Value> = products.iter().map(Product::to_json).collect();
    writeln!(out, "{}", serde_json::to_string_pretty(&rendered)?)?;
    Ok(())
}

fn write_report<W: Write>(out: &mut W, report: &IngestReport) -> Result<()> {
    for name in &report.accepted {
        writeln!(out, "✓ {}", name)?;
    }
    for rejected in &report.rejected {
        writeln!(out, "✗ {}: {}", rejected.name, rejected.reason)?;
    }
    writeln!(out, "{} product(s) ready", report.products_ready())?;
    Ok(())
}

/// Validate files without touching storage
pub fn preview_import<W: Write>(paths: &[PathBuf], out: &mut W) -> Result<IngestReport> {
    let files = read_csv_files(paths).context("reading CSV files")?;
    let report = CsvHandler::new().ingest_files(files);
    write_report(out, &report)?;
    Ok(report)
}

/// Run a data command against the catalog. `serve` and `migrate` belong to the binary.
pub async fn execute<W: Write>(service: &CatalogService, command: Command, out: &mut W) -> Result<()> {
    match command {
        Command::Import { paths, dry_run } => {
            let report = preview_import(&paths, out)?;
            if dry_run {
                return Ok(());
            }
            if report.products.is_empty() {
                bail!("No valid product rows to upload");
            }
            let inserted = service.upload(&report).await?;
            writeln!(out, "Inserted {} product(s)", inserted)?;
        }
        Command::Categories { action } => match action {
            CategoriesCommand::List => {
                for name in service.list_categories().await? {
                    writeln!(out, "{}", name)?;
                }
            }
            CategoriesCommand::Used => {
                for name in service.product_categories().await? {
                    writeln!(out, "{}", name)?;
                }
            }
            CategoriesCommand::Add { name } => {
                let name = name.trim();
                if name.is_empty() {
                    bail!("Category name must not be empty");
                }
                if service.add_category(name).await? {
                    writeln!(out, "Category '{}' added", name)?;
                } else {
                    writeln!(out, "Category '{}' already exists", name)?;
                }
            }
        },
        Command::Products { categories } => {
            let products = service.find_products(&ProductFilter::in_categories(categories)).await?;
            write_products(out, &products)?;
        }
        Command::Search { term } => {
            let term = term.trim();
            if term.is_empty() {
                writeln!(out, "Enter a search term")?;
                return Ok(());
            }
            let products = service.search_products(term).await?;
            write_products(out, &products)?;
        }
        Command::Recategorize { id, category } => {
            let id = ObjectId::parse_str(&id).with_context(|| format!("invalid product id '{}'", id))?;
            let category = category.trim();
            if category.is_empty() {
                bail!("Category must not be empty");
            }
            if service.update_product_category(id, category).await? {
                writeln!(out, "Product {} moved to '{}'", id, category)?;
            } else {
                bail!("Product {} was not updated", id);
            }
        }
        other @ (Command::Serve | Command::Migrate { .. }) => bail!("{:?} is not a data command", other),
    }
    Ok(())
}
