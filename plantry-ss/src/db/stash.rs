//! Seed stash queries (read side)
//!
//! Writes happen in the stash persister as one transaction; this module only
//! serves the listing API.

use chrono::Utc;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use plantry_common::{Error, Result};

use crate::models::StashRecord;

/// Most recently saved stash entries, newest first
pub async fn recent_stash(pool: &SqlitePool, limit: i64) -> Result<Vec<StashRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT stash_id, variety_id, variety_name, plant_type_name, vendor_name,
               barcode, packet_image_url, quantity, packed_for_year,
               storage_location, extraction_confidence, created_at
        FROM seed_stash
        ORDER BY created_at DESC
        LIMIT ?
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| {
            let stash_id: String = row.get("stash_id");
            let variety_id: Option<String> = row.get("variety_id");
            let created_at: String = row.get("created_at");

            Ok(StashRecord {
                stash_id: Uuid::parse_str(&stash_id)
                    .map_err(|e| Error::Internal(format!("Bad stash_id in database: {}", e)))?,
                variety_id: variety_id
                    .map(|s| {
                        Uuid::parse_str(&s).map_err(|e| {
                            Error::Internal(format!("Bad variety_id in database: {}", e))
                        })
                    })
                    .transpose()?,
                variety_name: row.get("variety_name"),
                plant_type_name: row.get("plant_type_name"),
                vendor_name: row.get("vendor_name"),
                barcode: row.get("barcode"),
                packet_image_url: row.get("packet_image_url"),
                quantity: row.get("quantity"),
                packed_for_year: row.get("packed_for_year"),
                storage_location: row.get("storage_location"),
                extraction_confidence: row.get("extraction_confidence"),
                created_at: chrono::DateTime::parse_from_rfc3339(&created_at)
                    .map_err(|e| Error::Internal(format!("Bad created_at in database: {}", e)))?
                    .with_timezone(&Utc),
            })
        })
        .collect()
}
