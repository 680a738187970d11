//! Settings database operations
//!
//! Get/set accessors for the settings table following the key-value pattern
//! shared across the Plantry suite. The database is the authoritative tier
//! for anything that can also come from ENV or TOML.

use sqlx::{Pool, Sqlite};
use plantry_common::Result;

/// Get the packet-vision extraction API key from the database
///
/// **Returns:** Some(key) if set, None otherwise
pub async fn get_extraction_api_key(db: &Pool<Sqlite>) -> Result<Option<String>> {
    get_setting::<String>(db, "extraction_api_key").await
}

/// Set the packet-vision extraction API key in the database
pub async fn set_extraction_api_key(db: &Pool<Sqlite>, key: String) -> Result<()> {
    set_setting(db, "extraction_api_key", key).await
}

/// Maximum time save operations wait out SQLite lock contention (ms)
///
/// **Default:** 5000
pub async fn get_max_lock_wait_ms(db: &Pool<Sqlite>) -> Result<u64> {
    Ok(get_setting::<u64>(db, "ss_database_max_lock_wait_ms")
        .await?
        .unwrap_or(5000))
}

/// Generic setting getter: parses the stored string into T
pub async fn get_setting<T: std::str::FromStr>(
    db: &Pool<Sqlite>,
    key: &str,
) -> Result<Option<T>> {
    let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await?;

    Ok(value.and_then(|v| v.parse::<T>().ok()))
}

/// Generic setting setter (insert-or-replace)
pub async fn set_setting(
    db: &Pool<Sqlite>,
    key: &str,
    value: impl ToString,
) -> Result<()> {
    sqlx::query("INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)")
        .bind(key)
        .bind(value.to_string())
        .execute(db)
        .await?;
    Ok(())
}
