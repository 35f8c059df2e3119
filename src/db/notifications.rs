//! Notification persistence and bulk invalidation (spec §4.4, §4.7, §4.8).

use sqlx::{PgPool, Postgres, Transaction};

use crate::db::models::{Channel, NotificationRow, NotificationStatus};

/// Inserts a pending notification keyed by the idempotency tuple
/// `(rule_id, transaction_id, event_id, channel)`. Returns `None` on a
/// unique-key violation, treated as a harmless duplicate (spec §4.6, §7).
///
/// The conflict target is `event_id_key`, not `event_id`: Postgres conflict
/// inference must name an existing unique index exactly, and `event_id` is
/// nullable so the real constraint lives on the generated
/// `COALESCE(event_id, -1)` column (see migrations/0001_init.sql).
pub async fn try_insert(
    tx: &mut Transaction<'_, Postgres>,
    rule_id: i64,
    transaction_id: i64,
    event_id: Option<i64>,
    channel: Channel,
    message: &serde_json::Value,
    triggered_at: chrono::DateTime<chrono::Utc>,
) -> Result<Option<i64>, sqlx::Error> {
    let row: Option<(i64,)> = sqlx::query_as(
        r#"
        INSERT INTO notification (rule_id, transaction_id, event_id, channel, status, attempt_count, message, invalidated, triggered_at, created_at)
        VALUES ($1, $2, $3, $4, 'pending', 0, $5, false, $6, now())
        ON CONFLICT (rule_id, transaction_id, event_id_key, channel) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(rule_id)
    .bind(transaction_id)
    .bind(event_id)
    .bind(channel)
    .bind(message)
    .bind(triggered_at)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(row.map(|(id,)| id))
}

/// Bulk-invalidate by a single UPDATE keyed off `invalidated=false`, making
/// rollback idempotent (spec §4.4, §8 property 4).
pub async fn invalidate_for_block(
    tx: &mut Transaction<'_, Postgres>,
    block_id: i64,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE notification n
        SET invalidated = true, invalidated_at = now(), invalidation_reason = 'chain_reorg'
        FROM transaction t
        WHERE n.transaction_id = t.id
          AND t.block_id = $1
          AND n.invalidated = false
        "#,
    )
    .bind(block_id)
    .execute(&mut **tx)
    .await?;
    Ok(result.rows_affected())
}

pub async fn find(pool: &PgPool, id: i64) -> Result<Option<NotificationRow>, sqlx::Error> {
    sqlx::query_as::<_, NotificationRow>("SELECT * FROM notification WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn mark_delivering(pool: &PgPool, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE notification
        SET status = 'delivering', attempt_count = attempt_count + 1,
            first_attempt_at = COALESCE(first_attempt_at, now()), last_attempt_at = now()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn mark_delivered(pool: &PgPool, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE notification SET status = 'delivered' WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn mark_retrying(pool: &PgPool, id: i64, error: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE notification SET status = 'retrying', last_error = $2 WHERE id = $1")
        .bind(id)
        .bind(error)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn mark_dead_letter(pool: &PgPool, id: i64, error: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE notification SET status = 'dead_letter', last_error = $2 WHERE id = $1")
        .bind(id)
        .bind(error)
        .execute(pool)
        .await?;
    Ok(())
}

/// Denormalized view joined for dispatch, so the dispatcher doesn't need to
/// separately query transaction/event/rule tables per attempt.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DispatchContext {
    pub notification_id: i64,
    pub channel: Channel,
    pub message: serde_json::Value,
    pub rule_id: i64,
    pub rule_name: String,
    pub severity: String,
    pub recipient: Option<String>,
    pub invalidated: bool,
    pub tx_id: String,
    pub sender: String,
    pub success: bool,
    pub block_height: i64,
    pub event_index: Option<i32>,
    pub event_variant: Option<String>,
    pub event_contract_identifier: Option<String>,
}

pub async fn load_dispatch_context(
    pool: &PgPool,
    notification_id: i64,
) -> Result<Option<DispatchContext>, sqlx::Error> {
    sqlx::query_as::<_, DispatchContext>(
        r#"
        SELECT
            n.id AS notification_id,
            n.channel AS channel,
            n.message AS message,
            r.id AS rule_id,
            r.name AS rule_name,
            r.severity AS severity,
            CASE n.channel WHEN 'email' THEN r.emails ELSE r.webhook_url END AS recipient,
            n.invalidated AS invalidated,
            t.tx_id AS tx_id,
            t.sender AS sender,
            t.success AS success,
            b.height AS block_height,
            e.event_index AS event_index,
            e.variant AS event_variant,
            e.asset_id AS event_contract_identifier
        FROM notification n
        JOIN rule r ON r.id = n.rule_id
        JOIN transaction t ON t.id = n.transaction_id
        JOIN block b ON b.id = t.block_id
        LEFT JOIN event e ON e.id = n.event_id
        WHERE n.id = $1
        "#,
    )
    .bind(notification_id)
    .fetch_optional(pool)
    .await
}

pub async fn mark_failed(pool: &PgPool, id: i64, error: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE notification SET status = $3, last_error = $2 WHERE id = $1",
    )
    .bind(id)
    .bind(error)
    .bind(NotificationStatus::Failed)
    .execute(pool)
    .await?;
    Ok(())
}
