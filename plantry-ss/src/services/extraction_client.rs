//! Packet-vision extraction API client
//!
//! **[SSA-INT-020]** Sends a stored packet photo to the hosted vision
//! service and receives structured seed fields back. One request per
//! captured photo; failures are surfaced to the workflow and never retried
//! automatically here.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;

use plantry_common::config::PlantryToml;

use crate::models::ExtractedSeedData;

const EXTRACTION_BASE_URL: &str = "https://vision.plantry.dev/v1/packet/extract";
const USER_AGENT: &str = "Plantry/0.1.0 (https://github.com/plantry/plantry)";
const RATE_LIMIT_MS: u64 = 500; // hosted plan allows 2 requests per second
const DEFAULT_PUBLIC_BASE_URL: &str = "http://127.0.0.1:5741";

/// Extraction client errors
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Extraction service error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid extraction API key")]
    InvalidApiKey,

    /// Service processed the request but could not read the packet
    /// (e.g. "blurry image"); the message is user-facing
    #[error("{0}")]
    Rejected(String),

    #[error("Extraction API key not configured: {0}")]
    NotConfigured(String),
}

/// Extraction request payload
#[derive(Debug, Serialize)]
struct ExtractionRequest<'a> {
    image_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    barcode: Option<&'a str>,
}

/// Extraction response envelope
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExtractionResponse {
    pub success: bool,
    pub extracted_data: Option<ExtractedSeedData>,
    pub error: Option<String>,
}

/// Rate limiter for the extraction service (2 req/sec)
struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval_ms: u64) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval: Duration::from_millis(min_interval_ms),
        }
    }

    async fn wait(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                tracing::debug!("Extraction rate limiting: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}

/// Packet extraction contract
#[async_trait]
pub trait PacketExtractor: Send + Sync {
    /// Extract structured seed fields from a stored packet photo
    ///
    /// `image_url` is the service-relative stored URL; a previously decoded
    /// barcode is forwarded when present to help the service disambiguate.
    async fn extract(
        &self,
        image_url: &str,
        barcode: Option<&str>,
    ) -> Result<ExtractedSeedData, ExtractionError>;
}

/// Packet-vision API client
pub struct PacketExtractionClient {
    http_client: reqwest::Client,
    rate_limiter: RateLimiter,
    db: SqlitePool,
    toml_config: PlantryToml,
}

impl PacketExtractionClient {
    /// Create the client
    ///
    /// The API key is resolved per request (database → ENV → TOML) so a key
    /// configured through the settings API takes effect without a restart.
    pub fn new(db: SqlitePool, toml_config: PlantryToml) -> Result<Self, ExtractionError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ExtractionError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            rate_limiter: RateLimiter::new(RATE_LIMIT_MS),
            db,
            toml_config,
        })
    }

    /// Absolute URL the remote service can fetch the stored image from
    fn absolute_image_url(&self, image_url: &str) -> String {
        if image_url.starts_with("http://") || image_url.starts_with("https://") {
            return image_url.to_string();
        }
        let base = self
            .toml_config
            .public_base_url
            .as_deref()
            .unwrap_or(DEFAULT_PUBLIC_BASE_URL)
            .trim_end_matches('/');
        format!("{}{}", base, image_url)
    }
}

#[async_trait]
impl PacketExtractor for PacketExtractionClient {
    async fn extract(
        &self,
        image_url: &str,
        barcode: Option<&str>,
    ) -> Result<ExtractedSeedData, ExtractionError> {
        let api_key = crate::config::resolve_extraction_api_key(&self.db, &self.toml_config)
            .await
            .map_err(|e| ExtractionError::NotConfigured(e.to_string()))?;

        // Rate limit
        self.rate_limiter.wait().await;

        let request = ExtractionRequest {
            image_url: self.absolute_image_url(image_url),
            barcode,
        };

        tracing::debug!(
            image_url = %request.image_url,
            barcode = ?barcode,
            "Querying packet-vision extraction API"
        );

        let response = self
            .http_client
            .post(EXTRACTION_BASE_URL)
            .bearer_auth(&api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ExtractionError::NetworkError(e.to_string()))?;

        let status = response.status();

        if status == 401 {
            return Err(ExtractionError::InvalidApiKey);
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ExtractionError::ApiError(status.as_u16(), error_text));
        }

        let body: ExtractionResponse = response
            .json()
            .await
            .map_err(|e| ExtractionError::ParseError(e.to_string()))?;

        if !body.success {
            return Err(ExtractionError::Rejected(
                body.error
                    .unwrap_or_else(|| "Packet could not be read".to_string()),
            ));
        }

        let extracted = body.extracted_data.ok_or_else(|| {
            ExtractionError::ParseError("success response without extracted_data".to_string())
        })?;

        tracing::info!(
            variety_name = %extracted.variety_name,
            plant_type_name = %extracted.plant_type_name,
            confidence = ?extracted.confidence_score,
            "Packet extraction successful"
        );

        Ok(extracted)
    }
}
