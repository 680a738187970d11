//! Configuration resolution for plantry-ss
//!
//! Provides multi-tier resolution for the packet-vision extraction API key
//! with Database → ENV → TOML priority. The database tier is authoritative
//! so keys configured through the settings API win without a restart.

use plantry_common::config::PlantryToml;
use plantry_common::{Error, Result};
use sqlx::{Pool, Sqlite};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

/// Environment variable carrying the extraction API key
pub const EXTRACTION_KEY_ENV: &str = "PLANTRY_EXTRACTION_API_KEY";

/// Resolve the extraction API key from 3-tier configuration
///
/// **Priority:** Database → ENV → TOML
pub async fn resolve_extraction_api_key(
    db: &Pool<Sqlite>,
    toml_config: &PlantryToml,
) -> Result<String> {
    let mut sources = Vec::new();

    // Tier 1: Database (authoritative)
    let db_key = crate::db::settings::get_extraction_api_key(db).await?;
    if let Some(key) = &db_key {
        if is_valid_key(key) {
            sources.push("database");
        }
    }

    // Tier 2: Environment variable
    let env_key = std::env::var(EXTRACTION_KEY_ENV).ok();
    if let Some(key) = &env_key {
        if is_valid_key(key) {
            sources.push("environment");
        }
    }

    // Tier 3: TOML config
    let toml_key = toml_config.extraction_api_key.as_ref();
    if let Some(key) = toml_key {
        if is_valid_key(key) {
            sources.push("TOML");
        }
    }

    // Warn if multiple sources (potential misconfiguration)
    if sources.len() > 1 {
        warn!(
            "Extraction API key found in multiple sources: {}. Using database (highest priority).",
            sources.join(", ")
        );
    }

    // Resolution priority
    if let Some(key) = db_key {
        if is_valid_key(&key) {
            return Ok(key);
        }
    }

    if let Some(key) = env_key {
        if is_valid_key(&key) {
            return Ok(key);
        }
    }

    if let Some(key) = toml_key {
        if is_valid_key(key) {
            return Ok(key.clone());
        }
    }

    // No valid key found
    Err(Error::Config(format!(
        "Extraction API key not configured. Please configure using one of:\n\
         1. Web UI: http://localhost:5741/settings\n\
         2. Environment: {}=your-key-here\n\
         3. TOML config: ~/.config/plantry/plantry-ss.toml (extraction_api_key = \"your-key\")",
        EXTRACTION_KEY_ENV
    )))
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Sync settings from database to the TOML file (best-effort backup)
///
/// HashMap keys: "extraction_api_key", etc.
pub async fn sync_settings_to_toml(
    settings: HashMap<String, String>,
    toml_path: &Path,
) -> Result<()> {
    // Read existing TOML (or use defaults)
    let mut config: PlantryToml = if toml_path.exists() {
        let content = std::fs::read_to_string(toml_path)
            .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
        toml::from_str(&content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?
    } else {
        PlantryToml::default()
    };

    // Update fields from HashMap
    if let Some(key) = settings.get("extraction_api_key") {
        config.extraction_api_key = Some(key.clone());
    }

    // Write atomically (best-effort)
    match plantry_common::config::write_toml_config(&config, toml_path) {
        Ok(()) => {
            info!("Settings synced to TOML: {}", toml_path.display());
            Ok(())
        }
        Err(e) => {
            warn!("TOML write failed (database write succeeded): {}", e);
            Ok(()) // Graceful degradation
        }
    }
}
