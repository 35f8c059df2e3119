//! C8: background dispatch loop (spec §4.8).
//!
//! Consumes commit-bound `DispatchSignal`s; for each notification id,
//! selects the channel handler and invokes send with retry, a per-channel
//! circuit breaker, and a dead-letter queue on permanent failure.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use tokio::sync::mpsc;

use crate::config::Config;
use crate::db::dlq;
use crate::db::models::{Channel, FailureReason};
use crate::db::notifications::{self, DispatchContext};
use crate::telemetry;

use super::channels::{ChannelHandler, EventSummary, NotificationPayload, SendError};
use super::circuit_breaker::CircuitBreaker;
use super::DispatchSignal;

pub struct Dispatcher {
    pool: PgPool,
    handlers: HashMap<Channel, Arc<dyn ChannelHandler>>,
    breakers: HashMap<Channel, Arc<CircuitBreaker>>,
    max_attempts: u32,
    backoff_base: Duration,
}

impl Dispatcher {
    pub fn new(pool: PgPool, handlers: HashMap<Channel, Arc<dyn ChannelHandler>>, config: &Config) -> Self {
        let mut breakers = HashMap::new();
        breakers.insert(
            Channel::Email,
            Arc::new(CircuitBreaker::new(
                config.circuit_window,
                config.circuit_failure_rate_pct,
                config.circuit_cool_off,
            )),
        );
        breakers.insert(
            Channel::Webhook,
            Arc::new(CircuitBreaker::new(
                config.circuit_window,
                config.circuit_failure_rate_pct,
                config.circuit_cool_off,
            )),
        );

        Self {
            pool,
            handlers,
            breakers,
            max_attempts: config.dispatch_max_attempts,
            backoff_base: config.dispatch_backoff_base,
        }
    }

    pub fn spawn(self, mut rx: mpsc::Receiver<DispatchSignal>) {
        let dispatcher = Arc::new(self);
        tokio::spawn(async move {
            while let Some(signal) = rx.recv().await {
                for id in signal.notification_ids {
                    let dispatcher = dispatcher.clone();
                    tokio::spawn(async move {
                        dispatcher.dispatch_one(id).await;
                    });
                }
            }
        });
    }

    async fn dispatch_one(&self, notification_id: i64) {
        let context = match notifications::load_dispatch_context(&self.pool, notification_id).await {
            Ok(Some(context)) => context,
            Ok(None) => {
                tracing::warn!(notification_id, "notification vanished before dispatch");
                return;
            }
            Err(error) => {
                tracing::error!(notification_id, %error, "failed to load dispatch context");
                return;
            }
        };

        // Reorg invalidation is checked both here and is implicit in the
        // status gate; an already-attempted delivery is never recalled
        // (spec §7 user-visible behavior), but a not-yet-attempted one must
        // not be sent.
        if context.invalidated {
            tracing::info!(notification_id, "notification invalidated before dispatch, skipping");
            return;
        }

        let Some(handler) = self.handlers.get(&context.channel) else {
            let _ = notifications::mark_failed(&self.pool, notification_id, "no handler for channel").await;
            self.insert_dlq(&context, FailureReason::NoHandler, "no handler registered for channel", 0)
                .await;
            telemetry::record_dispatch(channel_label(context.channel), "no_service");
            return;
        };

        let breaker = self.breakers.get(&context.channel).cloned();

        if let Some(breaker) = &breaker {
            if !breaker.allow() {
                let _ = notifications::mark_dead_letter(&self.pool, notification_id, "circuit open").await;
                self.insert_dlq(&context, FailureReason::CircuitOpen, "circuit breaker open", 0)
                    .await;
                telemetry::record_dispatch(channel_label(context.channel), "failure");
                return;
            }
        }

        let payload = build_payload(&context);
        let mut last_error = String::new();
        let mut attempts = 0;

        for attempt in 0..self.max_attempts {
            attempts = attempt + 1;
            let _ = notifications::mark_delivering(&self.pool, notification_id).await;

            match handler.send(&payload).await {
                Ok(()) => {
                    let _ = notifications::mark_delivered(&self.pool, notification_id).await;
                    if let Some(breaker) = &breaker {
                        breaker.record_success();
                    }
                    telemetry::record_dispatch(channel_label(context.channel), "success");
                    return;
                }
                Err(SendError::InvalidRecipient) => {
                    let _ = notifications::mark_dead_letter(&self.pool, notification_id, "invalid recipient").await;
                    self.insert_dlq(&context, FailureReason::InvalidRecipient, "invalid recipient", attempts)
                        .await;
                    telemetry::record_dispatch(channel_label(context.channel), "failure");
                    return;
                }
                Err(error) => {
                    last_error = match error {
                        SendError::Timeout => "timeout".into(),
                        SendError::Transient => "delivery attempt failed".into(),
                        SendError::InvalidRecipient => unreachable!(),
                    };
                    if let Some(breaker) = &breaker {
                        breaker.record_failure();
                    }
                    let _ = notifications::mark_retrying(&self.pool, notification_id, &last_error).await;

                    if attempt + 1 < self.max_attempts {
                        let backoff = self.backoff_base * 2u32.pow(attempt);
                        tokio::time::sleep(backoff).await;
                    }
                }
            }
        }

        let reason = if last_error == "timeout" {
            FailureReason::Timeout
        } else {
            FailureReason::MaxRetriesExceeded
        };
        let _ = notifications::mark_dead_letter(&self.pool, notification_id, &last_error).await;
        self.insert_dlq(&context, reason, &last_error, attempts).await;
        telemetry::record_dispatch(channel_label(context.channel), "failure");
    }

    async fn insert_dlq(&self, context: &DispatchContext, reason: FailureReason, error: &str, attempts: u32) {
        let result = dlq::insert(
            &self.pool,
            context.notification_id,
            context.rule_id,
            &context.rule_name,
            context.channel,
            context.recipient.as_deref().unwrap_or(""),
            reason,
            Some(error),
            None,
            attempts as i32,
            None,
        )
        .await;
        if let Err(error) = result {
            tracing::error!(notification_id = context.notification_id, %error, "failed to insert DLQ row");
        }
    }
}

fn channel_label(channel: Channel) -> &'static str {
    match channel {
        Channel::Email => "email",
        Channel::Webhook => "webhook",
    }
}

fn build_payload(context: &DispatchContext) -> NotificationPayload {
    let event = context.event_index.map(|event_index| EventSummary {
        variant: context.event_variant.clone().unwrap_or_default(),
        event_index,
        contract_identifier: context.event_contract_identifier.clone(),
        description: context
            .message
            .get("description")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string(),
    });

    NotificationPayload {
        notification_id: context.notification_id,
        triggered_at: context
            .message
            .get("triggered_at")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(chrono::Utc::now),
        alert_rule_id: context.rule_id,
        alert_rule_name: context.rule_name.clone(),
        severity: context.severity.clone(),
        recipient: context.recipient.clone(),
        tx_id: context.tx_id.clone(),
        sender: context.sender.clone(),
        success: context.success,
        block_height: context.block_height,
        event,
        message: context.message.to_string(),
    }
}
