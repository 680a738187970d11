//! Vendor barcode directory queries
//!
//! Maps physical barcodes to known seed products. Shared, long-lived data:
//! after creation only `scan_count`, `last_scanned_at` and a first-time
//! variety link are ever updated (see the stash persister).

use chrono::Utc;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use plantry_common::{Error, Result};

use crate::models::VendorProduct;

/// Look up a barcode in the vendor directory
pub async fn find_by_barcode(pool: &SqlitePool, barcode: &str) -> Result<Option<VendorProduct>> {
    let row = sqlx::query(
        r#"
        SELECT barcode, product_name, vendor_name, plant_type_name, packet_size,
               packet_image_url, variety_id, scan_count, last_scanned_at
        FROM vendor_barcodes
        WHERE barcode = ?
        "#,
    )
    .bind(barcode)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => {
            let variety_id: Option<String> = row.get("variety_id");
            let variety_id = variety_id
                .map(|s| {
                    Uuid::parse_str(&s)
                        .map_err(|e| Error::Internal(format!("Bad variety_id in database: {}", e)))
                })
                .transpose()?;

            let last_scanned_at: Option<String> = row.get("last_scanned_at");
            let last_scanned_at = last_scanned_at
                .map(|s| {
                    chrono::DateTime::parse_from_rfc3339(&s)
                        .map(|dt| dt.with_timezone(&Utc))
                        .map_err(|e| {
                            Error::Internal(format!("Bad last_scanned_at in database: {}", e))
                        })
                })
                .transpose()?;

            Ok(Some(VendorProduct {
                barcode: row.get("barcode"),
                product_name: row.get("product_name"),
                vendor_name: row.get("vendor_name"),
                plant_type_name: row.get("plant_type_name"),
                packet_size: row.get("packet_size"),
                packet_image_url: row.get("packet_image_url"),
                variety_id,
                scan_count: row.get("scan_count"),
                last_scanned_at,
            }))
        }
        None => Ok(None),
    }
}
