//! Rollback cascades into soft-delete and bulk notification invalidation;
//! re-applying restores the block without un-invalidating notifications
//! (spec §8 properties 4 & 5, scenario S2/S6).

use bigdecimal::BigDecimal;
use chainwatch::ingestion;
use chainwatch::rules::RuleIndex;
use chainwatch::webhook::payload::{ApplyBlock, ApplyTransaction, IndexerPayload, RollbackBlock};
use sqlx::PgPool;

fn apply_payload() -> IndexerPayload {
    IndexerPayload {
        apply: vec![ApplyBlock {
            hash: "0xrb".into(),
            height: 2000,
            parent_hash: "0xparent".into(),
            timestamp: Some(chrono::Utc::now()),
            txs: vec![ApplyTransaction {
                tx_id: "0xrbtx".into(),
                sender: "SPxyz".into(),
                success: true,
                position: 0,
                nonce: 0,
                fee: BigDecimal::from(10),
                cost_compute: None,
                cost_memory: None,
                contract_call: None,
                events: vec![],
            }],
        }],
        rollback: vec![],
    }
}

fn rollback_payload() -> IndexerPayload {
    IndexerPayload {
        apply: vec![],
        rollback: vec![RollbackBlock { hash: "0xrb".into() }],
    }
}

async fn insert_pending_notification(pool: &PgPool, transaction_id: i64, rule_id: i64) -> i64 {
    let row: (i64,) = sqlx::query_as(
        r#"
        INSERT INTO notification (rule_id, transaction_id, event_id, channel, status, attempt_count, message, invalidated, triggered_at, created_at)
        VALUES ($1, $2, NULL, 'webhook', 'pending', 0, '{}'::jsonb, false, now(), now())
        RETURNING id
        "#,
    )
    .bind(rule_id)
    .bind(transaction_id)
    .fetch_one(pool)
    .await
    .unwrap();
    row.0
}

async fn insert_rule(pool: &PgPool) -> i64 {
    let row: (i64,) = sqlx::query_as(
        r#"
        INSERT INTO rule (user_id, name, variant, active, cooldown_seconds, channels, version)
        VALUES ($1, 'watch-everything', 'failed_transaction', true, 60, 'webhook', 0)
        RETURNING id
        "#,
    )
    .bind(uuid::Uuid::new_v4())
    .fetch_one(pool)
    .await
    .unwrap();
    row.0
}

#[sqlx::test]
async fn rollback_invalidates_and_is_idempotent(pool: PgPool) {
    let index = RuleIndex::default();
    ingestion::process_payload(&pool, &index, &apply_payload()).await.unwrap();

    let rule_id = insert_rule(&pool).await;
    let (tx_id,): (i64,) = sqlx::query_as("SELECT id FROM transaction WHERE tx_id = $1")
        .bind("0xrbtx")
        .fetch_one(&pool)
        .await
        .unwrap();
    let notification_id = insert_pending_notification(&pool, tx_id, rule_id).await;

    ingestion::process_payload(&pool, &index, &rollback_payload()).await.unwrap();

    let (deleted, invalidated): (bool, bool) = sqlx::query_as(
        "SELECT t.deleted, n.invalidated FROM transaction t JOIN notification n ON n.transaction_id = t.id WHERE n.id = $1",
    )
    .bind(notification_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert!(deleted);
    assert!(invalidated);

    // Second rollback changes zero additional rows (idempotent WHERE clause).
    ingestion::process_payload(&pool, &index, &rollback_payload()).await.unwrap();

    let (invalidated_at,): (Option<chrono::DateTime<chrono::Utc>>,) =
        sqlx::query_as("SELECT invalidated_at FROM notification WHERE id = $1")
            .bind(notification_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert!(invalidated_at.is_some());

    // Re-apply restores the block but must not un-invalidate the notification.
    ingestion::process_payload(&pool, &index, &apply_payload()).await.unwrap();

    let (block_deleted,): (bool,) = sqlx::query_as("SELECT deleted FROM block WHERE block_hash = $1")
        .bind("0xrb")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert!(!block_deleted);

    let (still_invalidated,): (bool,) = sqlx::query_as("SELECT invalidated FROM notification WHERE id = $1")
        .bind(notification_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert!(still_invalidated);
}

#[sqlx::test]
async fn rollback_of_unknown_block_is_a_noop(pool: PgPool) {
    let index = RuleIndex::default();
    ingestion::process_payload(
        &pool,
        &index,
        &IndexerPayload {
            apply: vec![],
            rollback: vec![RollbackBlock { hash: "0xneverseen".into() }],
        },
    )
    .await
    .expect("rollback of unknown block does not error");
}
