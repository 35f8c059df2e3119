//! C4: the transactional core. Idempotent block/transaction/event upsert,
//! rollback cascade, bulk notification invalidation (spec §4.4).

pub mod worker;

use sqlx::PgPool;

use crate::db::{blocks, events, notifications, transactions};
use crate::matcher;
use crate::rules::RuleIndex;
use crate::webhook::payload::{ApplyBlock, IndexerPayload};

/// Result of processing one payload: the ids of notifications created in
/// this transaction, to be published iff the transaction commits (C7).
pub struct IngestOutcome {
    pub created_notification_ids: Vec<i64>,
}

/// Processes one webhook payload end to end: rollbacks first, in received
/// order, then applies, in received order (spec §5 ordering guarantees).
/// The whole call is one database transaction — the commit boundary that
/// gates dispatch (spec §4.7).
pub async fn process_payload(
    pool: &PgPool,
    index: &RuleIndex,
    payload: &IndexerPayload,
) -> Result<IngestOutcome, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let mut created_notification_ids = Vec::new();

    for rollback in &payload.rollback {
        process_rollback(&mut tx, &rollback.hash).await?;
    }

    for apply in &payload.apply {
        let ids = process_apply(&mut tx, index, apply).await?;
        created_notification_ids.extend(ids);
    }

    tx.commit().await?;

    Ok(IngestOutcome {
        created_notification_ids,
    })
}

async fn process_rollback(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    block_hash: &str,
) -> Result<(), sqlx::Error> {
    let Some(block) = blocks::find_by_hash(tx, block_hash).await? else {
        tracing::info!(block_hash, "rollback for unknown block, no-op");
        return Ok(());
    };

    if block.deleted {
        tracing::info!(block_hash, block_id = block.id, "block already rolled back, skipping");
        return Ok(());
    }

    blocks::soft_delete(tx, block.id).await?;
    let tx_ids = transactions::soft_delete_for_block(tx, block.id).await?;
    events::soft_delete_for_transactions(tx, &tx_ids).await?;
    let invalidated = notifications::invalidate_for_block(tx, block.id).await?;

    tracing::info!(
        block_hash,
        block_id = block.id,
        transactions = tx_ids.len(),
        notifications_invalidated = invalidated,
        "rolled back block"
    );

    Ok(())
}

async fn process_apply(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    index: &RuleIndex,
    apply: &ApplyBlock,
) -> Result<Vec<i64>, sqlx::Error> {
    let existing = blocks::find_by_hash(tx, &apply.hash).await?;

    let block = match existing {
        None => {
            let timestamp = apply.timestamp.unwrap_or_else(chrono::Utc::now);
            blocks::insert(tx, &apply.hash, apply.height, &apply.parent_hash, timestamp).await?
        }
        Some(block) if block.deleted => {
            // Restoration: MUST NOT un-invalidate previously invalidated
            // notifications (spec §4.4, property 5).
            blocks::restore(tx, block.id).await?;
            block
        }
        Some(_) => {
            // Live, re-delivered: skip re-matching already-applied blocks.
            tracing::debug!(block_hash = %apply.hash, "block already live, skipping apply");
            return Ok(Vec::new());
        }
    };

    let mut created = Vec::new();
    for apply_tx in &apply.txs {
        let row = transactions::upsert(
            tx,
            block.id,
            &apply_tx.tx_id,
            &apply_tx.sender,
            apply_tx.success,
            apply_tx.position,
            apply_tx.nonce,
            &apply_tx.fee,
            apply_tx.cost_compute,
            apply_tx.cost_memory,
        )
        .await?;

        let mut event_rows = Vec::with_capacity(apply_tx.events.len());
        for event in &apply_tx.events {
            let stored = events::upsert(
                tx,
                row.id,
                event.event_index,
                event.variant,
                event.asset_id.as_deref(),
                event.amount.as_ref(),
                event.sender.as_deref(),
                event.recipient.as_deref(),
                event.topic.as_deref(),
                event.decoded_value.as_ref(),
            )
            .await?;
            event_rows.push(stored);
        }

        let ids = matcher::match_transaction(
            tx,
            index,
            &row,
            &event_rows,
            apply_tx.contract_call.as_ref(),
        )
        .await?;
        created.extend(ids);
    }

    Ok(created)
}
