//! Block upsert / soft-delete queries (C4, spec §4.4).

use sqlx::{Postgres, Transaction};

use crate::db::models::BlockRow;

pub async fn find_by_hash(
    tx: &mut Transaction<'_, Postgres>,
    block_hash: &str,
) -> Result<Option<BlockRow>, sqlx::Error> {
    sqlx::query_as::<_, BlockRow>("SELECT * FROM block WHERE block_hash = $1")
        .bind(block_hash)
        .fetch_optional(&mut **tx)
        .await
}

/// Inserts a new block row. Idempotent under concurrent delivery: the
/// caller retries via `find_by_hash` on a unique-constraint violation
/// (spec §4.4: "on unique-constraint violation retry by lookup").
pub async fn insert(
    tx: &mut Transaction<'_, Postgres>,
    block_hash: &str,
    height: i64,
    parent_hash: &str,
    timestamp: chrono::DateTime<chrono::Utc>,
) -> Result<BlockRow, sqlx::Error> {
    sqlx::query_as::<_, BlockRow>(
        r#"
        INSERT INTO block (block_hash, height, parent_hash, timestamp, deleted, version)
        VALUES ($1, $2, $3, $4, false, 0)
        RETURNING *
        "#,
    )
    .bind(block_hash)
    .bind(height)
    .bind(parent_hash)
    .bind(timestamp)
    .fetch_one(&mut **tx)
    .await
}

/// Restoration path (spec §4.4): clears `deleted`/`deleted_at` without
/// touching invalidated notifications.
pub async fn restore(tx: &mut Transaction<'_, Postgres>, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE block SET deleted = false, deleted_at = NULL, version = version + 1 WHERE id = $1")
        .bind(id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Rollback path (spec §4.4): soft-deletes the block.
pub async fn soft_delete(tx: &mut Transaction<'_, Postgres>, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE block SET deleted = true, deleted_at = now(), version = version + 1 WHERE id = $1 AND deleted = false",
    )
    .bind(id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}
