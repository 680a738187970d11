//! Database access for plantry-ss
//!
//! **[SSA-DB-010]** Shared SQLite database access. The scan workflow itself
//! is never persisted; these tables hold the durable records its explicit
//! side effects produce (scan history, vendor barcode directory, catalog
//! varieties, seed stash) plus the settings key/value store.

pub mod scan_history;
pub mod settings;
pub mod stash;
pub mod vendor_barcodes;

use anyhow::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool
///
/// **[SSA-DB-010]** Connects to the shared plantry.db in the root folder
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Use proper SQLite URI with mode=rwc (read, write, create)
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;

    init_tables(&pool).await?;

    Ok(pool)
}

/// Initialize plantry-ss specific tables
async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Append-only: one row per barcode decode, never mutated
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS scan_history (
            scan_id TEXT PRIMARY KEY,
            barcode TEXT NOT NULL,
            found INTEGER NOT NULL,
            scanned_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS vendor_barcodes (
            barcode TEXT PRIMARY KEY,
            product_name TEXT NOT NULL,
            vendor_name TEXT NOT NULL,
            plant_type_name TEXT NOT NULL,
            packet_size TEXT,
            packet_image_url TEXT,
            variety_id TEXT,
            scan_count INTEGER NOT NULL DEFAULT 0,
            last_scanned_at TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS catalog_varieties (
            variety_id TEXT PRIMARY KEY,
            variety_name TEXT NOT NULL,
            plant_type_name TEXT NOT NULL,
            vendor_name TEXT,
            days_to_maturity INTEGER,
            spacing_recommended TEXT,
            sun_requirement TEXT,
            water_requirement TEXT,
            seed_line_type TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS seed_stash (
            stash_id TEXT PRIMARY KEY,
            variety_id TEXT,
            variety_name TEXT NOT NULL,
            plant_type_name TEXT NOT NULL,
            vendor_name TEXT,
            barcode TEXT,
            packet_image_url TEXT,
            quantity INTEGER NOT NULL DEFAULT 1,
            packed_for_year INTEGER NOT NULL,
            storage_location TEXT,
            extraction_confidence REAL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!(
        "Database tables initialized (settings, scan_history, vendor_barcodes, catalog_varieties, seed_stash)"
    );

    Ok(())
}
