//! Race-free cooldown gate: exactly one of K concurrent attempts wins
//! (spec §4.6, §8 property 3, scenario S3).

use chainwatch::db::rules as rules_db;
use sqlx::PgPool;

async fn insert_rule_with_cooldown(pool: &PgPool, cooldown_seconds: i64) -> i64 {
    let row: (i64,) = sqlx::query_as(
        r#"
        INSERT INTO rule (user_id, name, variant, active, cooldown_seconds, channels, version)
        VALUES ($1, 'cooldown-race-rule', 'failed_transaction', true, $2, 'webhook', 0)
        RETURNING id
        "#,
    )
    .bind(uuid::Uuid::new_v4())
    .bind(cooldown_seconds)
    .fetch_one(pool)
    .await
    .unwrap();
    row.0
}

#[sqlx::test]
async fn ten_concurrent_attempts_exactly_one_wins(pool: PgPool) {
    let rule_id = insert_rule_with_cooldown(&pool, 60).await;
    let now = chrono::Utc::now();

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..10 {
        let pool = pool.clone();
        tasks.spawn(async move {
            let mut tx = pool.begin().await.unwrap();
            let won = rules_db::try_trigger_cooldown(&mut tx, rule_id, now).await.unwrap();
            tx.commit().await.unwrap();
            won
        });
    }

    let mut wins = 0;
    while let Some(result) = tasks.join_next().await {
        if result.unwrap() {
            wins += 1;
        }
    }

    assert_eq!(wins, 1, "exactly one concurrent attempt must win the cooldown gate");
}

#[sqlx::test]
async fn gate_reopens_after_cooldown_elapses(pool: PgPool) {
    let rule_id = insert_rule_with_cooldown(&pool, 1).await;

    let first = chrono::Utc::now();
    let mut tx = pool.begin().await.unwrap();
    assert!(rules_db::try_trigger_cooldown(&mut tx, rule_id, first).await.unwrap());
    tx.commit().await.unwrap();

    // Still within the 1s cooldown: immediate retry loses.
    let mut tx = pool.begin().await.unwrap();
    assert!(!rules_db::try_trigger_cooldown(&mut tx, rule_id, first).await.unwrap());
    tx.commit().await.unwrap();

    // Past the cooldown window: the gate is open again.
    let later = first + chrono::Duration::seconds(2);
    let mut tx = pool.begin().await.unwrap();
    assert!(rules_db::try_trigger_cooldown(&mut tx, rule_id, later).await.unwrap());
    tx.commit().await.unwrap();
}
