use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use std::str::FromStr;

use crate::models::catalog::{CatalogEntry, EntryState, Label};

fn entry_from_row(row: &PgRow) -> Result<CatalogEntry, sqlx::Error> {
    let state_str: String = row.try_get("state")?;
    let state = EntryState::from_str(&state_str).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

    let labels: Option<Json<Vec<Label>>> = row.try_get("labels")?;

    Ok(CatalogEntry {
        image_key: row.try_get("image_key")?,
        state,
        labels: labels.map(|Json(l)| l),
        thumbnail_key: row.try_get("thumbnail_key")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Fetch one entry by its immutable key.
pub async fn get_entry(pool: &PgPool, image_key: &str) -> Result<Option<CatalogEntry>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT image_key, state, labels, thumbnail_key, created_at, updated_at
        FROM catalog_entries
        WHERE image_key = $1
        "#,
    )
    .bind(image_key)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(entry_from_row).transpose()
}

/// Insert-or-update keyed on `image_key`; atomic per key, so concurrent
/// redeliveries of the same message collapse into one row. Timestamps are
/// maintained by the store, not the caller.
pub async fn upsert_entry(pool: &PgPool, entry: &CatalogEntry) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO catalog_entries (image_key, state, labels, thumbnail_key)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (image_key) DO UPDATE
        SET state = EXCLUDED.state,
            labels = EXCLUDED.labels,
            thumbnail_key = EXCLUDED.thumbnail_key,
            updated_at = NOW()
        "#,
    )
    .bind(&entry.image_key)
    .bind(entry.state.to_string())
    .bind(entry.labels.as_ref().map(Json))
    .bind(&entry.thumbnail_key)
    .execute(pool)
    .await?;

    Ok(())
}

/// Record that processing for `image_key` was abandoned (dead-lettered).
/// Never downgrades an entry that already labeled successfully, which covers
/// the duplicate-delivery-after-success race.
pub async fn mark_failed(pool: &PgPool, image_key: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO catalog_entries (image_key, state)
        VALUES ($1, 'failed')
        ON CONFLICT (image_key) DO UPDATE
        SET state = 'failed', updated_at = NOW()
        WHERE catalog_entries.state = 'pending'
        "#,
    )
    .bind(image_key)
    .execute(pool)
    .await?;

    Ok(())
}

/// Delete one entry; returns whether a row existed.
pub async fn delete_entry(pool: &PgPool, image_key: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM catalog_entries WHERE image_key = $1")
        .bind(image_key)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// One page of entries under a key prefix, ordered by `image_key`.
/// Restartable: pass the last key of the previous page as `after`.
pub async fn list_by_prefix(
    pool: &PgPool,
    prefix: &str,
    after: Option<&str>,
    limit: i64,
) -> Result<Vec<CatalogEntry>, sqlx::Error> {
    let pattern = format!("{}%", escape_like(prefix));

    let rows = sqlx::query(
        r#"
        SELECT image_key, state, labels, thumbnail_key, created_at, updated_at
        FROM catalog_entries
        WHERE image_key LIKE $1 AND ($2::text IS NULL OR image_key > $2)
        ORDER BY image_key
        LIMIT $3
        "#,
    )
    .bind(&pattern)
    .bind(after)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter().map(entry_from_row).collect()
}

/// Escape LIKE metacharacters so a key prefix is matched literally.
fn escape_like(prefix: &str) -> String {
    prefix
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_like_metacharacters() {
        assert_eq!(escape_like("private/u1/"), "private/u1/");
        assert_eq!(escape_like("private/u_1/"), "private/u\\_1/");
        assert_eq!(escape_like("100%/"), "100\\%/");
        assert_eq!(escape_like(r"a\b"), r"a\\b");
    }
}
