use std::sync::Arc;

use anyhow::Result;
use async_graphql::http::{playground_source, GraphQLPlaygroundConfig};
use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum::{
    extract::State,
    http::Method,
    response::{Html, IntoResponse},
    routing::{get, post},
    Router,
};
use clap::Parser;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use catalog_service::cli::{self, Cli, Command};
use catalog_service::database::DatabaseManager;
use catalog_service::{create_schema, CatalogSchema, CatalogService, Config, LogFormat, MemoryCatalogStore, MongoCatalogStore};
use mongodb_migrator::{MigrationCliRunner, MigrationRunner, ServiceConfig};

#[derive(Clone)]
struct AppState {
    schema: CatalogSchema,
}

async fn graphql_handler(State(state): State<AppState>, req: GraphQLRequest) -> GraphQLResponse {
    state.schema.execute(req.into_inner()).await.into()
}

async fn graphql_playground() -> impl IntoResponse {
    Html(playground_source(GraphQLPlaygroundConfig::new("/graphql")))
}

async fn health() -> impl IntoResponse {
    "OK"
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Json => fmt()
            .with_env_filter(filter)
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .init(),
        LogFormat::Pretty => fmt().with_env_filter(filter).init(),
    }
}

/// Apply pending migrations; failures are logged and startup continues
async fn run_startup_migrations(db: &DatabaseManager, config: &Config) -> Result<()> {
    info!("Running pending migrations on startup...");
    let registry = mongodb_migrator::create_migration_registry()?;
    let runner = MigrationRunner::with_config(db.database().clone(), registry, config.migration_config());
    runner.initialize().await?;

    let results = runner.migrate_up(None).await?;
    if !results.is_empty() {
        info!("Applied {} migration(s) on startup", results.len());
    }
    for result in results {
        if result.success {
            info!("  {}", result.line());
        } else {
            tracing::error!("  {}", result.line());
        }
    }
    Ok(())
}

async fn serve(service: CatalogService, port: u16) -> Result<()> {
    let app_state = AppState {
        schema: create_schema(service),
    };

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
        .allow_origin(Any);

    let app = Router::new()
        .route("/graphql", post(graphql_handler))
        .route("/graphql", get(graphql_playground))
        .route("/health", get(health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    info!("🚀 Catalog service started on http://0.0.0.0:{}", port);
    info!("📊 GraphQL Playground: http://0.0.0.0:{}/graphql", port);
    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env();
    init_tracing(config.log_format);

    let command = Cli::parse().command();

    if let Command::Migrate { command } = command {
        return MigrationCliRunner::new(config).execute_command(command).await;
    }

    if command.is_offline() {
        let service = CatalogService::from_store(Arc::new(MemoryCatalogStore::new()));
        return cli::execute(&service, command, &mut std::io::stdout().lock()).await;
    }

    info!(uri = %config.mongodb_uri, database = %config.database_name, "Connecting to MongoDB");
    let db = DatabaseManager::new(&config.mongodb_uri, &config.database_name).await?;
    db.ping().await?;
    info!("Connected to MongoDB successfully");

    let store = MongoCatalogStore::new(db.clone()).with_transactions(config.mongodb_transactions);
    let service = CatalogService::from_store(Arc::new(store));

    match command {
        Command::Serve => {
            if config.auto_migrate {
                if let Err(e) = run_startup_migrations(&db, &config).await {
                    tracing::warn!(error = %e, "Failed to run migrations on startup");
                }
            }
            serve(service, config.server_port).await
        }
        other => cli::execute(&service, other, &mut std::io::stdout().lock()).await,
    }
}
