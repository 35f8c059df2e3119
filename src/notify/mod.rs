//! C7: notification registry and commit-bound publication.
//!
//! The matcher appends created notification ids into a per-ingestion-
//! transaction buffer (`IngestOutcome`); on commit, exactly one
//! `DispatchSignal` is sent carrying those ids. On rollback nothing is
//! sent. This in-process channel is the "enqueue on commit" mechanism
//! described in spec §9 — channel delivery has side effects the database
//! cannot undo, so it cannot live in the same transaction.

pub mod channels;
pub mod circuit_breaker;
pub mod dispatcher;

#[derive(Debug, Clone)]
pub struct DispatchSignal {
    pub notification_ids: Vec<i64>,
}
