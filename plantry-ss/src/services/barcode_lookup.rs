//! Barcode → vendor product lookup
//!
//! The decode-time side effect lives here too: every lookup appends a
//! scan_history row recording whether the barcode was known. Photo-only
//! flows never call this operation, so they leave no history — the
//! directory analytics are barcode-path only.

use async_trait::async_trait;
use sqlx::SqlitePool;

use plantry_common::Result;

use crate::models::VendorProduct;

/// Barcode lookup contract
#[async_trait]
pub trait BarcodeLookup: Send + Sync {
    /// Resolve a decoded barcode to a known vendor product, if any
    async fn lookup(&self, barcode: &str) -> Result<Option<VendorProduct>>;
}

/// Production lookup against the vendor_barcodes table
pub struct DbBarcodeLookup {
    db: SqlitePool,
}

impl DbBarcodeLookup {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl BarcodeLookup for DbBarcodeLookup {
    async fn lookup(&self, barcode: &str) -> Result<Option<VendorProduct>> {
        let product = crate::db::vendor_barcodes::find_by_barcode(&self.db, barcode).await?;

        crate::db::scan_history::record_scan(&self.db, barcode, product.is_some()).await?;

        tracing::info!(
            barcode,
            found = product.is_some(),
            "Vendor barcode lookup complete"
        );

        Ok(product)
    }
}
