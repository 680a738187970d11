//! Settings API endpoint
//!
//! Provides POST /api/settings/extraction_api_key for Web UI configuration.

use crate::{ApiError, ApiResult, AppState};
use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, warn};

/// Request payload for setting the extraction API key
#[derive(Debug, Deserialize)]
pub struct SetApiKeyRequest {
    /// The packet-vision extraction API key to configure
    pub api_key: String,
}

/// Response payload for API key configuration
#[derive(Debug, Serialize)]
pub struct SetApiKeyResponse {
    /// Whether the operation succeeded
    pub success: bool,
    /// Human-readable status message
    pub message: String,
}

/// POST /api/settings/extraction_api_key handler
///
/// **Request:** `{"api_key": "your-extraction-key"}`
/// **Response:** `{"success": true, "message": "..."}`
///
/// **Behavior:**
/// 1. Validate key (non-empty, non-whitespace)
/// 2. Write to database (authoritative)
/// 3. Sync to TOML (best-effort backup)
///
/// **Errors:**
/// - 400 Bad Request: Empty or whitespace-only key
/// - 500 Internal Server Error: Database write failure
///
/// **Note:** TOML write failures log warnings but do not fail the request
pub async fn set_extraction_api_key(
    State(state): State<AppState>,
    Json(payload): Json<SetApiKeyRequest>,
) -> ApiResult<Json<SetApiKeyResponse>> {
    // Validate key (non-empty, non-whitespace)
    if !crate::config::is_valid_key(&payload.api_key) {
        return Err(ApiError::BadRequest(
            "API key cannot be empty or whitespace-only".to_string(),
        ));
    }

    // Write to database (authoritative)
    crate::db::settings::set_extraction_api_key(&state.db, payload.api_key.clone())
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to save API key to database: {}", e)))?;

    info!("Extraction API key configured via Web UI");

    // Sync to TOML (best-effort backup)
    let toml_path = plantry_common::config::service_config_path("plantry-ss");

    let mut settings = HashMap::new();
    settings.insert("extraction_api_key".to_string(), payload.api_key);

    match crate::config::sync_settings_to_toml(settings, &toml_path).await {
        Ok(()) => {
            info!("API key synced to TOML: {}", toml_path.display());
        }
        Err(e) => {
            warn!("TOML sync failed (database write succeeded): {}", e);
        }
    }

    Ok(Json(SetApiKeyResponse {
        success: true,
        message: "Extraction API key saved".to_string(),
    }))
}

/// Build settings routes
pub fn settings_routes() -> Router<AppState> {
    Router::new().route(
        "/api/settings/extraction_api_key",
        post(set_extraction_api_key),
    )
}
