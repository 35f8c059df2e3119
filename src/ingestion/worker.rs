//! Background ingestion worker: the webhook handler archives and accepts
//! (200) immediately, then hands the payload to this queue so the actual
//! ingestion transaction runs off the request path (spec §5).

use std::sync::Arc;

use sqlx::PgPool;
use tokio::sync::mpsc;

use crate::db::raw_webhook;
use crate::ingestion;
use crate::notify::DispatchSignal;
use crate::rules::RuleIndexCache;
use crate::webhook::payload::IndexerPayload;

pub struct IngestionJob {
    pub raw_id: i64,
    pub payload: IndexerPayload,
}

pub type IngestionSender = mpsc::Sender<IngestionJob>;

pub fn spawn(
    pool: PgPool,
    rule_index: Arc<RuleIndexCache>,
    dispatch_tx: mpsc::Sender<DispatchSignal>,
    capacity: usize,
) -> IngestionSender {
    let (tx, mut rx) = mpsc::channel::<IngestionJob>(capacity);

    tokio::spawn(async move {
        while let Some(job) = rx.recv().await {
            if let Err(error) = handle_job(&pool, &rule_index, &dispatch_tx, &job).await {
                tracing::error!(raw_id = job.raw_id, %error, "ingestion job failed");
                let _ = raw_webhook::mark_failed(&pool, job.raw_id, &error.to_string(), None).await;
            }
        }
    });

    tx
}

async fn handle_job(
    pool: &PgPool,
    rule_index: &RuleIndexCache,
    dispatch_tx: &mpsc::Sender<DispatchSignal>,
    job: &IngestionJob,
) -> Result<(), sqlx::Error> {
    let index = rule_index.get(pool).await?;

    // The ingestion transaction either commits all its effects or none
    // (spec §4.4 concurrency/failure semantics). `?` below propagates any
    // failure straight up; there is no partial commit to undo.
    let outcome = ingestion::process_payload(pool, &index, &job.payload).await?;

    raw_webhook::mark_processed(pool, job.raw_id).await?;

    // Commit-bound publication: this send only happens because
    // `process_payload` returned Ok, i.e. after the transaction committed
    // (spec §4.7). A dropped receiver (dispatcher restarting) is logged and
    // swallowed — the outbox is the notification table itself, not this
    // channel, so no data is lost, only timeliness.
    if !outcome.created_notification_ids.is_empty() {
        if dispatch_tx
            .send(DispatchSignal {
                notification_ids: outcome.created_notification_ids,
            })
            .await
            .is_err()
        {
            tracing::warn!(raw_id = job.raw_id, "dispatcher channel closed, notifications remain pending");
        }
    }

    Ok(())
}
