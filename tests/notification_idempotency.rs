//! Idempotent notification creation: at most one row per
//! `(rule_id, transaction_id, event_id, channel)` even when the matcher (or
//! a bare retried insert) is driven twice for the same key (spec §4.6, §8
//! property 2, scenario S3).
//!
//! Regression test for the `ON CONFLICT` target mismatch between the
//! generated `event_id_key` column and the nullable `event_id` column: a
//! wrong conflict target makes every insert raise 42P10, not just a
//! colliding one, so this drives real ingestion/matcher code rather than
//! hand-written SQL that could mask the bug.

use bigdecimal::BigDecimal;
use chainwatch::db::notifications;
use chainwatch::matcher;
use chainwatch::rules::RuleIndexCache;
use sqlx::PgPool;

async fn insert_active_rule(pool: &PgPool, channels: &str, cooldown_seconds: i64) -> i64 {
    let row: (i64,) = sqlx::query_as(
        r#"
        INSERT INTO rule (user_id, name, variant, active, cooldown_seconds, channels, emails, webhook_url, version)
        VALUES ($1, 'duplicate-delivery-rule', 'failed_transaction', true, $2, $3, 'a@b.com', 'https://example.com/hook', 0)
        RETURNING id
        "#,
    )
    .bind(uuid::Uuid::new_v4())
    .bind(cooldown_seconds)
    .bind(channels)
    .fetch_one(pool)
    .await
    .unwrap();
    row.0
}

async fn insert_failed_transaction(pool: &PgPool) -> chainwatch::db::models::TransactionRow {
    let (block_id,): (i64,) = sqlx::query_as(
        "INSERT INTO block (block_hash, height, parent_hash, timestamp) VALUES ($1, 1, '0xparent', now()) RETURNING id",
    )
    .bind(format!("0x{}", uuid::Uuid::new_v4().simple()))
    .fetch_one(pool)
    .await
    .unwrap();

    sqlx::query_as::<_, chainwatch::db::models::TransactionRow>(
        r#"
        INSERT INTO transaction (tx_id, block_id, sender, success, position, nonce, fee)
        VALUES ($1, $2, 'SPsender', false, 0, 0, $3)
        RETURNING *
        "#,
    )
    .bind(format!("0x{}", uuid::Uuid::new_v4().simple()))
    .bind(block_id)
    .bind(BigDecimal::from(0))
    .fetch_one(pool)
    .await
    .unwrap()
}

async fn notification_count(pool: &PgPool, rule_id: i64, transaction_id: i64) -> i64 {
    let (count,): (i64,) = sqlx::query_as(
        "SELECT count(*) FROM notification WHERE rule_id = $1 AND transaction_id = $2",
    )
    .bind(rule_id)
    .bind(transaction_id)
    .fetch_one(pool)
    .await
    .unwrap();
    count
}

#[sqlx::test]
async fn try_insert_same_key_twice_creates_exactly_one_row(pool: PgPool) {
    let rule_id = insert_active_rule(&pool, "webhook", 0).await;
    let transaction = insert_failed_transaction(&pool).await;
    let message = serde_json::json!({});
    let now = chrono::Utc::now();

    let mut tx = pool.begin().await.unwrap();
    let first = notifications::try_insert(&mut tx, rule_id, transaction.id, None, chainwatch::db::models::Channel::Webhook, &message, now)
        .await
        .expect("first insert must not raise a conflict-target error");
    tx.commit().await.unwrap();
    assert!(first.is_some(), "first insert of a fresh key must succeed");

    let mut tx = pool.begin().await.unwrap();
    let second = notifications::try_insert(&mut tx, rule_id, transaction.id, None, chainwatch::db::models::Channel::Webhook, &message, now)
        .await
        .expect("a duplicate key must be swallowed, not raise 42P10");
    tx.commit().await.unwrap();
    assert!(second.is_none(), "duplicate key must not create a second row");

    assert_eq!(notification_count(&pool, rule_id, transaction.id).await, 1);
}

#[sqlx::test]
async fn matcher_creates_one_notification_per_channel_under_duplicate_delivery(pool: PgPool) {
    // Zero cooldown so the gate wins on every call — isolates the
    // notification-uniqueness property from cooldown suppression.
    let rule_id = insert_active_rule(&pool, "email,webhook", 0).await;
    let transaction = insert_failed_transaction(&pool).await;

    let rule_index = RuleIndexCache::new();
    let index = rule_index.get(&pool).await.unwrap();

    for _ in 0..2 {
        let mut tx = pool.begin().await.unwrap();
        matcher::match_transaction(&mut tx, &index, &transaction, &[], None)
            .await
            .expect("repeated matching must not abort the ingestion transaction");
        tx.commit().await.unwrap();
    }

    assert_eq!(
        notification_count(&pool, rule_id, transaction.id).await,
        2,
        "exactly one notification per channel (email, webhook), no duplicates from the second matcher pass"
    );
}
