//! Durable store access: pool construction, migrations, and per-table query
//! modules (spec §6.2).

pub mod blocks;
pub mod dlq;
pub mod events;
pub mod models;
pub mod notifications;
pub mod raw_webhook;
pub mod revoked_tokens;
pub mod rules;
pub mod transactions;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

pub async fn connect(url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
