//! Catalog variety matching
//!
//! Decides whether extracted packet data corresponds to an existing catalog
//! variety (`link_barcode`) or needs a new catalog entry on save
//! (`create_new`). Matching is exact but case-insensitive on variety name +
//! plant type; an empty variety name short-circuits to `create_new` so the
//! user can still proceed and fix the name in review.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use plantry_common::{Error, Result};

use crate::models::MatchVerdict;

/// Catalog match contract
#[async_trait]
pub trait CatalogMatcher: Send + Sync {
    async fn match_variety(
        &self,
        variety_name: &str,
        plant_type_name: &str,
    ) -> Result<MatchVerdict>;
}

/// Production matcher against the catalog_varieties table
pub struct DbCatalogMatcher {
    db: SqlitePool,
}

impl DbCatalogMatcher {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CatalogMatcher for DbCatalogMatcher {
    async fn match_variety(
        &self,
        variety_name: &str,
        plant_type_name: &str,
    ) -> Result<MatchVerdict> {
        if variety_name.trim().is_empty() {
            return Ok(MatchVerdict::create_new());
        }

        let row = sqlx::query(
            r#"
            SELECT variety_id, variety_name
            FROM catalog_varieties
            WHERE variety_name = ? COLLATE NOCASE
              AND plant_type_name = ? COLLATE NOCASE
            LIMIT 1
            "#,
        )
        .bind(variety_name.trim())
        .bind(plant_type_name.trim())
        .fetch_optional(&self.db)
        .await?;

        let verdict = match row {
            Some(row) => {
                let variety_id: String = row.get("variety_id");
                let matched_name: String = row.get("variety_name");
                let variety_id = Uuid::parse_str(&variety_id)
                    .map_err(|e| Error::Internal(format!("Bad variety_id in database: {}", e)))?;
                MatchVerdict::link(variety_id, matched_name)
            }
            None => MatchVerdict::create_new(),
        };

        tracing::info!(
            variety_name,
            plant_type_name,
            action = ?verdict.action,
            "Catalog match complete"
        );

        Ok(verdict)
    }
}
