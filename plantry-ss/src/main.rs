//! plantry-ss - Seed Scan Microservice
//!
//! **Module Identity:**
//! - Name: plantry-ss (Seed Scan)
//! - Port: 5741
//!
//! Owns the barcode/packet-photo scan-and-identify workflow for the Plantry
//! suite: drives the per-session state machine, talks to the packet-vision
//! extraction service, and commits confirmed scans to the seed stash.
//! Integrates with the Plantry web UI via HTTP REST + SSE.

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use plantry_common::config;
use plantry_common::events::EventBus;

use plantry_ss::services::{
    DbBarcodeLookup, DbCatalogMatcher, DbStashPersister, DiskImageStore, PacketExtractionClient,
};
use plantry_ss::workflow::WorkflowDeps;
use plantry_ss::AppState;

#[derive(Debug, Parser)]
#[command(name = "plantry-ss", about = "Plantry Seed Scan microservice")]
struct Cli {
    /// Root data folder (overrides PLANTRY_ROOT_FOLDER and TOML)
    #[arg(long)]
    root_folder: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Step 1: Load service TOML (missing file falls back to defaults)
    let toml_config = config::load_service_toml("plantry-ss")?;

    // Initialize tracing
    let filter = toml_config
        .log_filter
        .clone()
        .map(EnvFilter::new)
        .unwrap_or_else(|| {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
        });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting plantry-ss (Seed Scan) microservice");
    info!("Port: 5741");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Step 2: Resolve and create the root folder
    let root_folder = config::resolve_root_folder(
        cli.root_folder.as_deref(),
        "PLANTRY_ROOT_FOLDER",
        &toml_config,
    );
    config::ensure_root_folder(&root_folder)
        .map_err(|e| anyhow::anyhow!("Failed to initialize root folder: {}", e))?;
    info!("Root folder: {}", root_folder.display());

    // Step 3: Open or create the shared database
    let db_path = config::database_path(&root_folder);
    info!("Database: {}", db_path.display());

    let db_pool = plantry_ss::db::init_database_pool(&db_path).await?;
    info!("Database connection established");

    // Create event bus for SSE broadcasting
    let event_bus = EventBus::new(100);
    info!("Event bus initialized");

    // Wire up the workflow collaborators
    let image_store = DiskImageStore::new(&root_folder);
    let image_dir = image_store.dir().to_path_buf();
    let extraction_client = PacketExtractionClient::new(db_pool.clone(), toml_config.clone())
        .map_err(|e| anyhow::anyhow!("Failed to create extraction client: {}", e))?;

    let deps = WorkflowDeps {
        lookup: Arc::new(DbBarcodeLookup::new(db_pool.clone())),
        extractor: Arc::new(extraction_client),
        matcher: Arc::new(DbCatalogMatcher::new(db_pool.clone())),
        persister: Arc::new(DbStashPersister::new(db_pool.clone())),
        images: Arc::new(image_store),
    };

    // Create application state
    let state = AppState::new(db_pool, event_bus, deps, image_dir);

    // Build router
    let app = plantry_ss::build_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind("127.0.0.1:5741").await?;
    info!("Listening on http://127.0.0.1:5741");
    info!("Health check: http://127.0.0.1:5741/health");

    axum::serve(listener, app).await?;

    Ok(())
}
