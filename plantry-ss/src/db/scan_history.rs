//! Scan history database operations
//!
//! One append-only row per barcode decode, capturing whether the vendor
//! directory knew the product. Lightweight analytics only — rows are never
//! mutated after creation, and photo-only flows write nothing here.

use chrono::Utc;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use plantry_common::{Error, Result};

use crate::models::ScanHistoryRecord;
use crate::utils::retry_on_lock;

/// Record one barcode scan attempt
pub async fn record_scan(pool: &SqlitePool, barcode: &str, found: bool) -> Result<Uuid> {
    let scan_id = Uuid::new_v4();
    let scan_id_str = scan_id.to_string();
    let scanned_at = Utc::now().to_rfc3339();

    let max_wait_ms = crate::db::settings::get_max_lock_wait_ms(pool).await?;

    retry_on_lock("record_scan", max_wait_ms, || async {
        sqlx::query(
            "INSERT INTO scan_history (scan_id, barcode, found, scanned_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&scan_id_str)
        .bind(barcode)
        .bind(found)
        .bind(&scanned_at)
        .execute(pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    })
    .await?;

    tracing::debug!(barcode, found, scan_id = %scan_id, "Scan attempt recorded");
    Ok(scan_id)
}

/// Most recent scan attempts, newest first
pub async fn recent_scans(pool: &SqlitePool, limit: i64) -> Result<Vec<ScanHistoryRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT scan_id, barcode, found, scanned_at
        FROM scan_history
        ORDER BY scanned_at DESC
        LIMIT ?
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| {
            let scan_id: String = row.get("scan_id");
            let scanned_at: String = row.get("scanned_at");
            Ok(ScanHistoryRecord {
                scan_id: Uuid::parse_str(&scan_id)
                    .map_err(|e| Error::Internal(format!("Bad scan_id in database: {}", e)))?,
                barcode: row.get("barcode"),
                found: row.get("found"),
                scanned_at: chrono::DateTime::parse_from_rfc3339(&scanned_at)
                    .map_err(|e| Error::Internal(format!("Bad scanned_at in database: {}", e)))?
                    .with_timezone(&Utc),
            })
        })
        .collect()
}

/// Count of recorded scan attempts (diagnostics and tests)
pub async fn scan_count(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM scan_history")
        .fetch_one(pool)
        .await?;
    Ok(count)
}
