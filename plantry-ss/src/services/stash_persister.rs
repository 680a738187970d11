//! Stash persistence
//!
//! **[SSA-DB-020]** Commits one confirmed scan as a single transaction:
//! the seed_stash row, a new catalog variety when the match verdict was
//! `create_new`, and the vendor barcode directory update (first-time link
//! or scan-count bump). The workflow treats the whole save as one opaque
//! call — there is no partial-success surface.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use plantry_common::{Error, Result};

use crate::models::{
    ExtractedSeedData, MatchAction, MatchVerdict, SavePayload, SaveSource, SavedStash,
    StashFields, VendorProduct,
};
use crate::utils::retry_on_lock;

/// Stash persistence contract
#[async_trait]
pub trait StashPersister: Send + Sync {
    /// Commit a confirmed scan; returns the saved stash identity
    async fn save(&self, payload: &SavePayload) -> Result<SavedStash>;
}

/// Production persister writing to the shared SQLite database
pub struct DbStashPersister {
    db: SqlitePool,
}

impl DbStashPersister {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    async fn save_once(&self, payload: &SavePayload) -> Result<SavedStash> {
        let mut tx = self.db.begin().await?;
        let now = Utc::now().to_rfc3339();

        let saved = match &payload.source {
            SaveSource::BarcodeMatch { product } => {
                let saved =
                    insert_stash_from_product(&mut tx, product, &payload.stash, &now).await?;
                bump_scan_count(&mut tx, &product.barcode, &now).await?;
                saved
            }
            SaveSource::PacketExtraction {
                extracted,
                verdict,
                packet_image_url,
            } => {
                let variety_id =
                    resolve_variety_id(&mut tx, extracted, verdict, &now).await?;
                let saved = insert_stash_from_extraction(
                    &mut tx,
                    extracted,
                    variety_id,
                    packet_image_url,
                    payload.scanned_barcode.as_deref(),
                    &payload.stash,
                    &now,
                )
                .await?;
                if let Some(barcode) = payload.scanned_barcode.as_deref() {
                    upsert_vendor_barcode(&mut tx, barcode, extracted, variety_id, packet_image_url, &now)
                        .await?;
                }
                saved
            }
        };

        tx.commit().await?;
        Ok(saved)
    }
}

#[async_trait]
impl StashPersister for DbStashPersister {
    async fn save(&self, payload: &SavePayload) -> Result<SavedStash> {
        let max_wait_ms = crate::db::settings::get_max_lock_wait_ms(&self.db).await?;

        let saved = retry_on_lock("save_scanned_seed", max_wait_ms, || async {
            self.save_once(payload).await
        })
        .await?;

        tracing::info!(
            stash_id = %saved.stash_id,
            variety_name = %saved.variety_name,
            "Seed stash record committed"
        );

        Ok(saved)
    }
}

type Tx<'a> = sqlx::Transaction<'a, sqlx::Sqlite>;

async fn insert_stash_from_product(
    tx: &mut Tx<'_>,
    product: &VendorProduct,
    stash: &StashFields,
    now: &str,
) -> Result<SavedStash> {
    let stash_id = Uuid::new_v4();

    // The directory stores one display name; the catalog split into variety
    // and plant type happens when the barcode is first linked to a variety.
    sqlx::query(
        r#"
        INSERT INTO seed_stash (
            stash_id, variety_id, variety_name, plant_type_name, vendor_name,
            barcode, packet_image_url, quantity, packed_for_year,
            storage_location, extraction_confidence, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, ?)
        "#,
    )
    .bind(stash_id.to_string())
    .bind(product.variety_id.map(|id| id.to_string()))
    .bind(&product.product_name)
    .bind(&product.plant_type_name)
    .bind(&product.vendor_name)
    .bind(&product.barcode)
    .bind(&product.packet_image_url)
    .bind(stash.quantity)
    .bind(stash.packed_for_year)
    .bind(&stash.storage_location)
    .bind(now)
    .execute(&mut **tx)
    .await
    .map_err(Error::Database)?;

    Ok(SavedStash {
        stash_id,
        variety_id: product.variety_id,
        variety_name: product.product_name.clone(),
    })
}

async fn bump_scan_count(tx: &mut Tx<'_>, barcode: &str, now: &str) -> Result<()> {
    sqlx::query(
        "UPDATE vendor_barcodes SET scan_count = scan_count + 1, last_scanned_at = ? WHERE barcode = ?",
    )
    .bind(now)
    .bind(barcode)
    .execute(&mut **tx)
    .await
    .map_err(Error::Database)?;
    Ok(())
}

/// Existing variety id for a link verdict; otherwise a freshly created
/// catalog entry built from the extracted fields
async fn resolve_variety_id(
    tx: &mut Tx<'_>,
    extracted: &ExtractedSeedData,
    verdict: &MatchVerdict,
    now: &str,
) -> Result<Option<Uuid>> {
    if verdict.action == MatchAction::LinkBarcode {
        if let Some(variety_id) = verdict.variety_id {
            return Ok(Some(variety_id));
        }
        // Malformed verdict; fall through and create rather than lose data
        tracing::warn!("link_barcode verdict without variety_id, creating catalog entry instead");
    }

    let variety_id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO catalog_varieties (
            variety_id, variety_name, plant_type_name, vendor_name,
            days_to_maturity, spacing_recommended, sun_requirement,
            water_requirement, seed_line_type, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(variety_id.to_string())
    .bind(&extracted.variety_name)
    .bind(&extracted.plant_type_name)
    .bind(&extracted.vendor_name)
    .bind(extracted.days_to_maturity)
    .bind(&extracted.spacing_recommended)
    .bind(&extracted.sun_requirement)
    .bind(&extracted.water_requirement)
    .bind(&extracted.seed_line_type)
    .bind(now)
    .execute(&mut **tx)
    .await
    .map_err(Error::Database)?;

    Ok(Some(variety_id))
}

#[allow(clippy::too_many_arguments)]
async fn insert_stash_from_extraction(
    tx: &mut Tx<'_>,
    extracted: &ExtractedSeedData,
    variety_id: Option<Uuid>,
    packet_image_url: &str,
    barcode: Option<&str>,
    stash: &StashFields,
    now: &str,
) -> Result<SavedStash> {
    let stash_id = Uuid::new_v4();

    sqlx::query(
        r#"
        INSERT INTO seed_stash (
            stash_id, variety_id, variety_name, plant_type_name, vendor_name,
            barcode, packet_image_url, quantity, packed_for_year,
            storage_location, extraction_confidence, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(stash_id.to_string())
    .bind(variety_id.map(|id| id.to_string()))
    .bind(&extracted.variety_name)
    .bind(&extracted.plant_type_name)
    .bind(&extracted.vendor_name)
    .bind(barcode)
    .bind(packet_image_url)
    .bind(stash.quantity)
    .bind(stash.packed_for_year)
    .bind(&stash.storage_location)
    .bind(extracted.confidence_score)
    .bind(now)
    .execute(&mut **tx)
    .await
    .map_err(Error::Database)?;

    Ok(SavedStash {
        stash_id,
        variety_id,
        variety_name: extracted.variety_name.clone(),
    })
}

/// First save of a previously-unknown barcode creates its directory entry;
/// a known barcode gets its scan count bumped and, if it was never linked,
/// its first variety link.
async fn upsert_vendor_barcode(
    tx: &mut Tx<'_>,
    barcode: &str,
    extracted: &ExtractedSeedData,
    variety_id: Option<Uuid>,
    packet_image_url: &str,
    now: &str,
) -> Result<()> {
    let product_name = format!("{} {}", extracted.variety_name, extracted.plant_type_name)
        .trim()
        .to_string();

    sqlx::query(
        r#"
        INSERT INTO vendor_barcodes (
            barcode, product_name, vendor_name, plant_type_name, packet_size,
            packet_image_url, variety_id, scan_count, last_scanned_at, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, 1, ?, ?)
        ON CONFLICT(barcode) DO UPDATE SET
            scan_count = vendor_barcodes.scan_count + 1,
            last_scanned_at = excluded.last_scanned_at,
            variety_id = COALESCE(vendor_barcodes.variety_id, excluded.variety_id)
        "#,
    )
    .bind(barcode)
    .bind(&product_name)
    .bind(extracted.vendor_name.as_deref().unwrap_or("Unknown vendor"))
    .bind(&extracted.plant_type_name)
    .bind(&extracted.packet_size)
    .bind(packet_image_url)
    .bind(variety_id.map(|id| id.to_string()))
    .bind(now)
    .bind(now)
    .execute(&mut **tx)
    .await
    .map_err(Error::Database)?;

    Ok(())
}
