//! Revocation table operations (C9, spec §4.9).

use chrono::{DateTime, Utc};
use sqlx::PgPool;

pub async fn revoke(
    pool: &PgPool,
    digest: &str,
    user_email: &str,
    reason: &str,
    expires_at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    // Idempotent: a token can be revoked more than once (e.g. logout racing
    // a bulk revoke) without erroring.
    sqlx::query(
        r#"
        INSERT INTO revoked_token (digest, user_email, revocation_reason, revoked_at, expires_at)
        VALUES ($1, $2, $3, now(), $4)
        ON CONFLICT (digest) DO NOTHING
        "#,
    )
    .bind(digest)
    .bind(user_email)
    .bind(reason)
    .bind(expires_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn is_revoked(pool: &PgPool, digest: &str) -> Result<bool, sqlx::Error> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM revoked_token WHERE digest = $1")
        .bind(digest)
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}

pub async fn revoke_all_for_user(pool: &PgPool, user_email: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM revoked_token WHERE user_email = $1")
        .bind(user_email)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Scheduled sweep: deletes rows whose `expires_at` has passed.
pub async fn sweep_expired(pool: &PgPool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM revoked_token WHERE expires_at < now()")
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
