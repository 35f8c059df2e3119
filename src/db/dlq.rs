//! Dead-letter queue operations (C8, spec §4.8).

use sqlx::PgPool;

use crate::db::models::{Channel, FailureReason};

#[allow(clippy::too_many_arguments)]
pub async fn insert(
    pool: &PgPool,
    notification_id: i64,
    alert_rule_id: i64,
    alert_rule_name: &str,
    channel: Channel,
    recipient: &str,
    failure_reason: FailureReason,
    error_message: Option<&str>,
    error_trace: Option<&str>,
    attempt_count: i32,
    first_attempt_at: Option<chrono::DateTime<chrono::Utc>>,
) -> Result<i64, sqlx::Error> {
    let row: (i64,) = sqlx::query_as(
        r#"
        INSERT INTO dlq (
            notification_id, alert_rule_id, alert_rule_name, channel, recipient,
            failure_reason, error_message, error_trace, attempt_count,
            first_attempt_at, last_attempt_at, queued_at, processed
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, now(), now(), false)
        RETURNING id
        "#,
    )
    .bind(notification_id)
    .bind(alert_rule_id)
    .bind(alert_rule_name)
    .bind(channel)
    .bind(recipient)
    .bind(failure_reason)
    .bind(error_message)
    .bind(error_trace)
    .bind(attempt_count)
    .bind(first_attempt_at)
    .fetch_one(pool)
    .await?;
    Ok(row.0)
}

pub async fn resolve(
    pool: &PgPool,
    id: i64,
    processed_by: &str,
    resolution_notes: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE dlq SET processed = true, processed_at = now(), processed_by = $2, resolution_notes = $3
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(processed_by)
    .bind(resolution_notes)
    .execute(pool)
    .await?;
    Ok(())
}
