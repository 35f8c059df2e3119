//! Event upsert queries (C4, spec §4.4).

use bigdecimal::BigDecimal;
use sqlx::{Postgres, Transaction};

use crate::db::models::{EventRow, EventVariant};

#[allow(clippy::too_many_arguments)]
pub async fn upsert(
    tx: &mut Transaction<'_, Postgres>,
    transaction_id: i64,
    event_index: i32,
    variant: EventVariant,
    asset_id: Option<&str>,
    amount: Option<&BigDecimal>,
    sender: Option<&str>,
    recipient: Option<&str>,
    topic: Option<&str>,
    decoded_value: Option<&serde_json::Value>,
) -> Result<EventRow, sqlx::Error> {
    // Unique on (transaction_id, event_index, variant) per spec's data model.
    sqlx::query_as::<_, EventRow>(
        r#"
        INSERT INTO event (transaction_id, event_index, variant, asset_id, amount, sender, recipient, topic, decoded_value, deleted)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, false)
        ON CONFLICT (transaction_id, event_index, variant) DO UPDATE SET
            asset_id = EXCLUDED.asset_id,
            amount = EXCLUDED.amount,
            sender = EXCLUDED.sender,
            recipient = EXCLUDED.recipient,
            topic = EXCLUDED.topic,
            decoded_value = EXCLUDED.decoded_value,
            deleted = false
        RETURNING *
        "#,
    )
    .bind(transaction_id)
    .bind(event_index)
    .bind(variant)
    .bind(asset_id)
    .bind(amount)
    .bind(sender)
    .bind(recipient)
    .bind(topic)
    .bind(decoded_value)
    .fetch_one(&mut **tx)
    .await
}

pub async fn soft_delete_for_transactions(
    tx: &mut Transaction<'_, Postgres>,
    transaction_ids: &[i64],
) -> Result<(), sqlx::Error> {
    if transaction_ids.is_empty() {
        return Ok(());
    }
    sqlx::query("UPDATE event SET deleted = true WHERE transaction_id = ANY($1) AND deleted = false")
        .bind(transaction_ids)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

pub async fn list_for_transaction(
    tx: &mut Transaction<'_, Postgres>,
    transaction_id: i64,
) -> Result<Vec<EventRow>, sqlx::Error> {
    sqlx::query_as::<_, EventRow>(
        "SELECT * FROM event WHERE transaction_id = $1 AND deleted = false ORDER BY event_index",
    )
    .bind(transaction_id)
    .fetch_all(&mut **tx)
    .await
}
