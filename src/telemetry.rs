//! Tracing initialization and lightweight counters/timers.
//!
//! The teacher backend initializes `env_logger`; this service runs several
//! concurrent subsystems (webhook handler, ingestion worker, dispatcher
//! worker) that need span-scoped correlation, so `tracing` + an env-filter
//! replaces `log`/`env_logger` entirely (see DESIGN.md).
//!
//! A metrics HTTP surface is out of scope (spec §1 Non-goals: health
//! endpoints), so the counters/timers named in spec §4.6/§4.8 are emitted as
//! structured tracing events rather than wired to a Prometheus exporter —
//! any collector tailing the log stream can aggregate them.

use std::time::Instant;

use tracing_subscriber::{fmt, EnvFilter};

pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_target(true).init();
}

/// `alert.matching.duration` timer, tagged with transaction kind and event count.
pub struct MatchTimer {
    start: Instant,
    tx_kind: &'static str,
}

impl MatchTimer {
    pub fn start(tx_kind: &'static str) -> Self {
        Self {
            start: Instant::now(),
            tx_kind,
        }
    }

    pub fn stop(self, event_count: usize) {
        let elapsed = self.start.elapsed();
        tracing::info!(
            metric = "alert.matching.duration",
            tx_kind = self.tx_kind,
            event_count,
            elapsed_ms = elapsed.as_millis() as u64,
        );
    }
}

/// `notification.dispatched{channel, status}` counter.
pub fn record_dispatch(channel: &str, status: &'static str) {
    tracing::info!(
        metric = "notification.dispatched",
        channel,
        status,
    );
}
