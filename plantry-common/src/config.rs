//! Configuration loading and root folder resolution

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Per-service TOML configuration (`~/.config/plantry/<service>.toml`)
///
/// Every field is optional; the database settings table is authoritative for
/// anything that can also be configured at runtime.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlantryToml {
    /// Root data folder override
    pub root_folder: Option<String>,

    /// API key for the hosted packet-vision extraction service
    pub extraction_api_key: Option<String>,

    /// Externally reachable base URL of this service (used when handing
    /// stored image URLs to remote services)
    pub public_base_url: Option<String>,

    /// tracing env-filter directive override (e.g. "plantry_ss=debug")
    pub log_filter: Option<String>,
}

/// Path of a service's TOML configuration file
pub fn service_config_path(service: &str) -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("plantry").join(format!("{}.toml", service)))
        .unwrap_or_else(|| PathBuf::from(format!("{}.toml", service)))
}

/// Load a service's TOML configuration
///
/// A missing file is not an error; defaults are returned so a fresh install
/// starts without any configuration step.
pub fn load_service_toml(service: &str) -> Result<PlantryToml> {
    let path = service_config_path(service);
    if !path.exists() {
        return Ok(PlantryToml::default());
    }
    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("Read TOML failed ({}): {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))
}

/// Write a service's TOML configuration atomically (temp file + rename)
pub fn write_toml_config(config: &PlantryToml, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp = path.with_extension("toml.tmp");
    std::fs::write(&tmp, content)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Root folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(
    cli_arg: Option<&str>,
    env_var_name: &str,
    config: &PlantryToml,
) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(root_folder) = config.root_folder.as_deref() {
        return PathBuf::from(root_folder);
    }

    // Priority 4: OS-dependent compiled default
    let default = default_root_folder();
    tracing::debug!("No root folder configured, using default: {}", default.display());
    default
}

/// Get OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/plantry (or /var/lib/plantry for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("plantry"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/plantry"))
    } else if cfg!(target_os = "macos") {
        // ~/Library/Application Support/plantry
        dirs::data_dir()
            .map(|d| d.join("plantry"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/plantry"))
    } else if cfg!(target_os = "windows") {
        // %LOCALAPPDATA%\plantry
        dirs::data_local_dir()
            .map(|d| d.join("plantry"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\plantry"))
    } else {
        PathBuf::from("./plantry_data")
    }
}

/// Create the root folder if it does not exist yet
pub fn ensure_root_folder(root: &Path) -> Result<()> {
    std::fs::create_dir_all(root)?;
    Ok(())
}

/// Path of the shared SQLite database inside the root folder
pub fn database_path(root: &Path) -> PathBuf {
    root.join("plantry.db")
}
