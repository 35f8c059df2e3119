//! Rule persistence with optimistic-lock updates (spec §5).
//!
//! Generic rule CRUD/pagination endpoints are out of scope (spec §1); this
//! module only carries the queries the core subsystems need: the active-set
//! read for index rebuild (C5), the cooldown gate's conditional UPDATE (C6),
//! and the version-guarded mutation path that invalidates the cache.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use crate::db::models::{Channel, RuleRow, RuleVariant};

pub async fn list_active(pool: &PgPool) -> Result<Vec<RuleRow>, sqlx::Error> {
    sqlx::query_as::<_, RuleRow>("SELECT * FROM rule WHERE active = true")
        .fetch_all(pool)
        .await
}

pub async fn find(pool: &PgPool, id: i64) -> Result<Option<RuleRow>, sqlx::Error> {
    sqlx::query_as::<_, RuleRow>("SELECT * FROM rule WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

#[allow(clippy::too_many_arguments)]
pub async fn create(
    pool: &PgPool,
    user_id: uuid::Uuid,
    name: &str,
    variant: RuleVariant,
    contract_id: Option<&str>,
    function_name: Option<&str>,
    asset_id: Option<&str>,
    watched_address: Option<&str>,
    amount_threshold: Option<&BigDecimal>,
    severity: &str,
    cooldown_seconds: i64,
    channels: &[Channel],
    emails: Option<&str>,
    webhook_url: Option<&str>,
) -> Result<RuleRow, sqlx::Error> {
    let channel_str = channel_list_to_string(channels);
    sqlx::query_as::<_, RuleRow>(
        r#"
        INSERT INTO rule (
            user_id, name, variant, contract_id, function_name, asset_id,
            watched_address, amount_threshold, severity, cooldown_seconds,
            channels, emails, webhook_url, active, version
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, true, 0)
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(name)
    .bind(variant)
    .bind(contract_id)
    .bind(function_name)
    .bind(asset_id)
    .bind(watched_address)
    .bind(amount_threshold)
    .bind(severity)
    .bind(cooldown_seconds)
    .bind(channel_str)
    .bind(emails)
    .bind(webhook_url)
    .fetch_one(pool)
    .await
}

/// Version-guarded update. Returns `Ok(None)` on an optimistic-lock
/// conflict (spec §5, §7: surfaced as 409 to the caller).
pub async fn set_active(
    pool: &PgPool,
    id: i64,
    expected_version: i32,
    active: bool,
) -> Result<Option<RuleRow>, sqlx::Error> {
    sqlx::query_as::<_, RuleRow>(
        r#"
        UPDATE rule SET active = $3, version = version + 1
        WHERE id = $1 AND version = $2
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(expected_version)
    .bind(active)
    .fetch_optional(pool)
    .await
}

/// The cooldown gate (spec §4.6): race-free because it is a single
/// conditional UPDATE with no intervening read-check-write window.
/// `rows_affected() == 1` means this caller won the gate.
pub async fn try_trigger_cooldown(
    tx: &mut Transaction<'_, Postgres>,
    id: i64,
    now: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE rule
        SET last_triggered_at = $2
        WHERE id = $1
          AND (last_triggered_at IS NULL OR last_triggered_at <= $2 - (cooldown_seconds * interval '1 second'))
        "#,
    )
    .bind(id)
    .bind(now)
    .execute(&mut **tx)
    .await?;
    Ok(result.rows_affected() == 1)
}

fn channel_list_to_string(channels: &[Channel]) -> String {
    channels
        .iter()
        .map(|c| match c {
            Channel::Email => "email",
            Channel::Webhook => "webhook",
        })
        .collect::<Vec<_>>()
        .join(",")
}
