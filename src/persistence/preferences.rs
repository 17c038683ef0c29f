//! Key-value preference storage.

use crate::error::{LabError, Result};
use sqlx::sqlite::SqlitePool;

/// Gets a preference value by key.
pub async fn get_preference(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let row: Option<(String,)> = sqlx::query_as("SELECT value FROM preferences WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await
        .map_err(|e| LabError::persistence(format!("Failed to read preference '{key}': {e}")))?;

    Ok(row.map(|(v,)| v))
}

/// Sets a preference value, replacing any previous one.
pub async fn set_preference(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO preferences (key, value, updated_at)
        VALUES (?, ?, datetime('now'))
        ON CONFLICT(key) DO UPDATE SET
            value = excluded.value,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await
    .map_err(|e| LabError::persistence(format!("Failed to save preference '{key}': {e}")))?;

    Ok(())
}
