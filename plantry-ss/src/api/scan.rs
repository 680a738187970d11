//! Scan workflow API handlers
//!
//! POST /scan/start opens a session; every other route drives one session's
//! state machine. Responses carry the full session snapshot so the browser
//! renders whatever step the server says it is on.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::{ExtractedSeedData, ScanHistoryRecord, ScanSession, ScanStep, StashFields, StashRecord};
use crate::workflow::SessionHandle;
use crate::AppState;

/// Session snapshot returned by every scan route
#[derive(Debug, Serialize)]
pub struct ScanStatusResponse {
    pub session_id: Uuid,
    #[serde(flatten)]
    pub step: ScanStep,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scanned_barcode: Option<String>,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl From<ScanSession> for ScanStatusResponse {
    fn from(session: ScanSession) -> Self {
        Self {
            session_id: session.session_id,
            step: session.step,
            scanned_barcode: session.scanned_barcode,
            started_at: session.started_at,
        }
    }
}

/// POST /scan/:id/barcode request
#[derive(Debug, Deserialize)]
pub struct DecodeRequest {
    pub barcode: String,
}

/// POST /scan/:id/device-error request
#[derive(Debug, Deserialize)]
pub struct DeviceErrorRequest {
    pub message: String,
}

/// POST /scan/:id/frame and /scan/:id/upload request
///
/// The browser sends captured frames and gallery picks the same way it
/// renders them: as data URLs.
#[derive(Debug, Deserialize)]
pub struct ImageRequest {
    pub image_data_url: String,
}

/// POST /scan/:id/review request (wholesale field-group replacement)
#[derive(Debug, Deserialize)]
pub struct ReviewUpdateRequest {
    pub extracted: Option<ExtractedSeedData>,
    pub stash: Option<StashFields>,
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

async fn session_or_404(state: &AppState, id: Uuid) -> ApiResult<SessionHandle> {
    state
        .session(id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Scan session not found: {}", id)))
}

async fn status_of(handle: &SessionHandle) -> Json<ScanStatusResponse> {
    Json(handle.snapshot().await.into())
}

/// POST /scan/start
///
/// Open a new scan session at the choice step.
pub async fn start_scan(State(state): State<AppState>) -> ApiResult<Json<ScanStatusResponse>> {
    let handle = state.create_session().await;
    Ok(status_of(&handle).await)
}

/// GET /scan/status/:session_id
pub async fn get_status(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<ScanStatusResponse>> {
    let handle = session_or_404(&state, session_id).await?;
    Ok(status_of(&handle).await)
}

/// POST /scan/:session_id/select-barcode
pub async fn select_barcode(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<ScanStatusResponse>> {
    let handle = session_or_404(&state, session_id).await?;
    handle.select_barcode_path().await?;
    Ok(status_of(&handle).await)
}

/// POST /scan/:session_id/select-photo
pub async fn select_photo(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<ScanStatusResponse>> {
    let handle = session_or_404(&state, session_id).await?;
    handle.select_photo_path().await?;
    Ok(status_of(&handle).await)
}

/// POST /scan/:session_id/proceed-to-photo
pub async fn proceed_to_photo(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<ScanStatusResponse>> {
    let handle = session_or_404(&state, session_id).await?;
    handle.proceed_to_photo().await?;
    Ok(status_of(&handle).await)
}

/// POST /scan/:session_id/barcode
pub async fn barcode_decoded(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<DecodeRequest>,
) -> ApiResult<Json<ScanStatusResponse>> {
    let handle = session_or_404(&state, session_id).await?;
    handle.on_barcode_decoded(&request.barcode).await?;
    Ok(status_of(&handle).await)
}

/// POST /scan/:session_id/device-error
pub async fn device_error(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<DeviceErrorRequest>,
) -> ApiResult<Json<ScanStatusResponse>> {
    let handle = session_or_404(&state, session_id).await?;
    handle.on_device_error(&request.message).await?;
    Ok(status_of(&handle).await)
}

/// POST /scan/:session_id/frame (camera capture)
pub async fn capture_frame(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<ImageRequest>,
) -> ApiResult<Json<ScanStatusResponse>> {
    let handle = session_or_404(&state, session_id).await?;
    let bytes = decode_data_url(&request.image_data_url)?;
    handle.on_frame(&bytes).await?;
    Ok(status_of(&handle).await)
}

/// POST /scan/:session_id/upload (gallery fallback)
pub async fn upload_photo(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<ImageRequest>,
) -> ApiResult<Json<ScanStatusResponse>> {
    let handle = session_or_404(&state, session_id).await?;
    let bytes = decode_data_url(&request.image_data_url)?;
    handle.on_upload(&bytes).await?;
    Ok(status_of(&handle).await)
}

/// POST /scan/:session_id/stash-fields
pub async fn update_stash_fields(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(fields): Json<StashFields>,
) -> ApiResult<Json<ScanStatusResponse>> {
    let handle = session_or_404(&state, session_id).await?;
    handle.update_stash_fields(fields).await?;
    Ok(status_of(&handle).await)
}

/// POST /scan/:session_id/review
pub async fn update_review(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<ReviewUpdateRequest>,
) -> ApiResult<Json<ScanStatusResponse>> {
    let handle = session_or_404(&state, session_id).await?;
    handle.update_review(request.extracted, request.stash).await?;
    Ok(status_of(&handle).await)
}

/// POST /scan/:session_id/confirm
pub async fn confirm(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<ScanStatusResponse>> {
    let handle = session_or_404(&state, session_id).await?;
    handle.confirm().await?;
    Ok(status_of(&handle).await)
}

/// POST /scan/:session_id/rescan
pub async fn rescan(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<ScanStatusResponse>> {
    let handle = session_or_404(&state, session_id).await?;
    handle.rescan().await?;
    Ok(status_of(&handle).await)
}

/// POST /scan/:session_id/close
///
/// Tears down any active device before the session is discarded.
pub async fn close_scan(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let handle = session_or_404(&state, session_id).await?;
    handle.close().await;
    state.remove_session(session_id).await;
    Ok(Json(serde_json::json!({ "closed": true })))
}

/// GET /scan/history?limit=
pub async fn scan_history(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Json<Vec<ScanHistoryRecord>>> {
    let limit = query.limit.unwrap_or(50).clamp(1, 500);
    let records = crate::db::scan_history::recent_scans(&state.db, limit).await?;
    Ok(Json(records))
}

/// GET /stash/recent?limit=
pub async fn recent_stash(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Json<Vec<StashRecord>>> {
    let limit = query.limit.unwrap_or(20).clamp(1, 200);
    let records = crate::db::stash::recent_stash(&state.db, limit).await?;
    Ok(Json(records))
}

/// Decode a browser data URL ("data:image/png;base64,....") into raw bytes
fn decode_data_url(data_url: &str) -> ApiResult<Vec<u8>> {
    let encoded = match data_url.split_once(',') {
        Some((prefix, encoded)) if prefix.starts_with("data:") && prefix.ends_with(";base64") => {
            encoded
        }
        _ => {
            return Err(ApiError::BadRequest(
                "Expected a base64 data URL".to_string(),
            ))
        }
    };

    BASE64
        .decode(encoded.trim())
        .map_err(|e| ApiError::BadRequest(format!("Invalid base64 image payload: {}", e)))
}

/// Build scan workflow routes
pub fn scan_routes() -> Router<AppState> {
    Router::new()
        .route("/scan/start", post(start_scan))
        .route("/scan/status/:session_id", get(get_status))
        .route("/scan/:session_id/select-barcode", post(select_barcode))
        .route("/scan/:session_id/select-photo", post(select_photo))
        .route("/scan/:session_id/proceed-to-photo", post(proceed_to_photo))
        .route("/scan/:session_id/barcode", post(barcode_decoded))
        .route("/scan/:session_id/device-error", post(device_error))
        .route("/scan/:session_id/frame", post(capture_frame))
        .route("/scan/:session_id/upload", post(upload_photo))
        .route("/scan/:session_id/stash-fields", post(update_stash_fields))
        .route("/scan/:session_id/review", post(update_review))
        .route("/scan/:session_id/confirm", post(confirm))
        .route("/scan/:session_id/rescan", post(rescan))
        .route("/scan/:session_id/close", post(close_scan))
        .route("/scan/history", get(scan_history))
        .route("/stash/recent", get(recent_stash))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_url_round_trip() {
        let url = format!("data:image/png;base64,{}", BASE64.encode(b"hello"));
        assert_eq!(decode_data_url(&url).unwrap(), b"hello");
    }

    #[test]
    fn plain_base64_is_rejected() {
        assert!(decode_data_url("aGVsbG8=").is_err());
        assert!(decode_data_url("data:image/png;base64").is_err());
    }

    #[test]
    fn bad_base64_is_rejected() {
        assert!(decode_data_url("data:image/png;base64,!!!not-base64!!!").is_err());
    }
}
