//! Transaction upsert queries (C4, spec §4.4).

use bigdecimal::BigDecimal;
use sqlx::{Postgres, Transaction};

use crate::db::models::TransactionRow;

pub async fn find_by_tx_id(
    tx: &mut Transaction<'_, Postgres>,
    tx_id: &str,
) -> Result<Option<TransactionRow>, sqlx::Error> {
    sqlx::query_as::<_, TransactionRow>("SELECT * FROM transaction WHERE tx_id = $1")
        .bind(tx_id)
        .fetch_optional(&mut **tx)
        .await
}

#[allow(clippy::too_many_arguments)]
pub async fn upsert(
    tx: &mut Transaction<'_, Postgres>,
    block_id: i64,
    tx_id: &str,
    sender: &str,
    success: bool,
    position: i32,
    nonce: i64,
    fee: &BigDecimal,
    cost_compute: Option<i64>,
    cost_memory: Option<i64>,
) -> Result<TransactionRow, sqlx::Error> {
    // ON CONFLICT keeps this safe under concurrent/duplicate delivery
    // (spec §8 property 1): unique on tx_id, content-hash keyed.
    sqlx::query_as::<_, TransactionRow>(
        r#"
        INSERT INTO transaction (tx_id, block_id, sender, success, position, nonce, fee, cost_compute, cost_memory, deleted)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, false)
        ON CONFLICT (tx_id) DO UPDATE SET
            block_id = EXCLUDED.block_id,
            sender = EXCLUDED.sender,
            success = EXCLUDED.success,
            position = EXCLUDED.position,
            nonce = EXCLUDED.nonce,
            fee = EXCLUDED.fee,
            cost_compute = EXCLUDED.cost_compute,
            cost_memory = EXCLUDED.cost_memory,
            deleted = false,
            deleted_at = NULL
        RETURNING *
        "#,
    )
    .bind(tx_id)
    .bind(block_id)
    .bind(sender)
    .bind(success)
    .bind(position)
    .bind(nonce)
    .bind(fee)
    .bind(cost_compute)
    .bind(cost_memory)
    .fetch_one(&mut **tx)
    .await
}

pub async fn soft_delete_for_block(
    tx: &mut Transaction<'_, Postgres>,
    block_id: i64,
) -> Result<Vec<i64>, sqlx::Error> {
    let rows: Vec<(i64,)> = sqlx::query_as(
        "UPDATE transaction SET deleted = true, deleted_at = now() WHERE block_id = $1 AND deleted = false RETURNING id",
    )
    .bind(block_id)
    .fetch_all(&mut **tx)
    .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

pub async fn list_for_block(
    tx: &mut Transaction<'_, Postgres>,
    block_id: i64,
) -> Result<Vec<TransactionRow>, sqlx::Error> {
    sqlx::query_as::<_, TransactionRow>(
        "SELECT * FROM transaction WHERE block_id = $1 AND deleted = false ORDER BY position",
    )
    .bind(block_id)
    .fetch_all(&mut **tx)
    .await
}
