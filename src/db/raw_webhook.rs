//! C1: raw event archive — persists every inbound webhook independently of
//! downstream success (spec §4.1).

use sqlx::PgPool;
use uuid::Uuid;

use crate::db::models::{ProcessingStatus, RawWebhookRow};

/// Archives an inbound POST in its own transaction so the row survives a
/// rollback of whatever the caller does next (spec §9: "the archival write
/// must be outside the ingestion transaction's rollback scope").
pub async fn archive(
    pool: &PgPool,
    headers: &serde_json::Value,
    body: &serde_json::Value,
    source_addr: &str,
    user_agent: Option<&str>,
) -> Result<(Uuid, i64), sqlx::Error> {
    let request_id = Uuid::new_v4();
    let row = sqlx::query_as::<_, (i64,)>(
        r#"
        INSERT INTO raw_webhook (request_id, received_at, headers, payload, processing_status, source_addr, user_agent)
        VALUES ($1, now(), $2, $3, 'pending', $4, $5)
        RETURNING id
        "#,
    )
    .bind(request_id)
    .bind(headers)
    .bind(body)
    .bind(source_addr)
    .bind(user_agent)
    .fetch_one(pool)
    .await?;

    Ok((request_id, row.0))
}

pub async fn mark_rejected(pool: &PgPool, raw_id: i64, reason: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE raw_webhook
        SET processing_status = 'rejected', processed_at = now(), error_message = $2
        WHERE id = $1
        "#,
    )
    .bind(raw_id)
    .bind(reason)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn mark_failed(
    pool: &PgPool,
    raw_id: i64,
    error: &str,
    trace: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE raw_webhook
        SET processing_status = 'failed', processed_at = now(), error_message = $2, error_trace = $3
        WHERE id = $1
        "#,
    )
    .bind(raw_id)
    .bind(error)
    .bind(trace)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn mark_processed(pool: &PgPool, raw_id: i64) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE raw_webhook
        SET processing_status = 'processed', processed_at = now()
        WHERE id = $1
        "#,
    )
    .bind(raw_id)
    .execute(pool)
    .await?;
    Ok(())
}

pub fn replayable(row: &RawWebhookRow) -> bool {
    matches!(
        row.processing_status,
        ProcessingStatus::Failed | ProcessingStatus::Pending
    )
}

pub async fn find(pool: &PgPool, raw_id: i64) -> Result<Option<RawWebhookRow>, sqlx::Error> {
    sqlx::query_as::<_, RawWebhookRow>("SELECT * FROM raw_webhook WHERE id = $1")
        .bind(raw_id)
        .fetch_optional(pool)
        .await
}
