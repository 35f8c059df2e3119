//! Idempotent block/transaction/event upsert under repeated delivery
//! (spec §8 property 1, scenario S1).

use bigdecimal::BigDecimal;
use chainwatch::ingestion;
use chainwatch::rules::RuleIndex;
use chainwatch::webhook::payload::{ApplyBlock, ApplyTransaction, IndexerPayload};

fn duplicate_payload() -> IndexerPayload {
    IndexerPayload {
        apply: vec![ApplyBlock {
            hash: "0xblock123".into(),
            height: 1000,
            parent_hash: "0xparent".into(),
            timestamp: Some(chrono::Utc::now()),
            txs: vec![ApplyTransaction {
                tx_id: "0xtx456".into(),
                sender: "SPabc".into(),
                success: true,
                position: 0,
                nonce: 0,
                fee: BigDecimal::from(100),
                cost_compute: None,
                cost_memory: None,
                contract_call: None,
                events: vec![],
            }],
        }],
        rollback: vec![],
    }
}

#[sqlx::test]
async fn duplicate_apply_produces_exactly_one_row(pool: sqlx::PgPool) {
    let index = RuleIndex::default();
    let payload = duplicate_payload();

    ingestion::process_payload(&pool, &index, &payload)
        .await
        .expect("first ingestion succeeds");
    ingestion::process_payload(&pool, &index, &payload)
        .await
        .expect("second ingestion succeeds");

    let blocks: Vec<(i64,)> = sqlx::query_as("SELECT id FROM block WHERE block_hash = $1")
        .bind("0xblock123")
        .fetch_all(&pool)
        .await
        .unwrap();
    assert_eq!(blocks.len(), 1);

    let txs: Vec<(i64,)> = sqlx::query_as("SELECT id FROM transaction WHERE tx_id = $1")
        .bind("0xtx456")
        .fetch_all(&pool)
        .await
        .unwrap();
    assert_eq!(txs.len(), 1);
}
