//! C6: alert matcher — candidate selection via the rule index, predicate
//! evaluation, and the atomic cooldown gate (spec §4.6).

use sqlx::{Postgres, Transaction};

use crate::db::models::{Channel, EventRow, RuleVariant, TransactionRow};
use crate::db::notifications;
use crate::db::rules as rules_db;
use crate::rules::snapshot::RuleSnapshot;
use crate::rules::RuleIndex;
use crate::telemetry::MatchTimer;
use crate::webhook::payload::ContractCallInfo;

/// Runs the full matcher for one ingested transaction, returning the ids of
/// notifications newly inserted into this ingestion's transaction. The
/// caller buffers these for commit-bound publication (C7).
pub async fn match_transaction(
    tx: &mut Transaction<'_, Postgres>,
    index: &RuleIndex,
    transaction: &TransactionRow,
    events: &[EventRow],
    contract_call: Option<&ContractCallInfo>,
) -> Result<Vec<i64>, sqlx::Error> {
    let timer = MatchTimer::start(if transaction.success { "success" } else { "failed" });
    let now = chrono::Utc::now();
    let mut created = Vec::new();

    // 1. contract-call candidates.
    if let Some(call) = contract_call {
        let candidates = index.contract_candidates(&call.contract_id, &call.function_name);
        for candidate in candidates {
            if candidate.matches_contract_call(&call.contract_id, &call.function_name) {
                fire(tx, &candidate, transaction, None, now, &mut created).await?;
            }
        }
    }

    // 2. per-event candidates: token transfers consult by_asset; print
    // events consult by_type[print_event].
    for event in events {
        if event.variant.is_token_transfer() {
            if let Some(asset_id) = &event.asset_id {
                let candidates: Vec<_> = index.asset_candidates(asset_id).to_vec();
                for candidate in candidates {
                    if candidate.matches_token_transfer(asset_id, event.amount.as_ref()) {
                        fire(tx, &candidate, transaction, Some(event.id), now, &mut created).await?;
                    }
                }
            }
            let addresses: Vec<&str> = [event.sender.as_deref(), event.recipient.as_deref()]
                .into_iter()
                .flatten()
                .collect();
            if !addresses.is_empty() {
                let candidates: Vec<_> = addresses
                    .iter()
                    .flat_map(|a| index.address_candidates(a).to_vec())
                    .collect();
                for candidate in candidates {
                    if candidate.matches_address_activity(&addresses) {
                        fire(tx, &candidate, transaction, Some(event.id), now, &mut created).await?;
                    }
                }
            }
        }
        if event.variant.is_print_event() {
            let candidates: Vec<_> = index.type_candidates(RuleVariant::PrintEvent).to_vec();
            for candidate in candidates {
                if candidate.matches_print_event() {
                    fire(tx, &candidate, transaction, Some(event.id), now, &mut created).await?;
                }
            }
        }
    }

    // 3. failed-transaction candidates. Both a matching contract-call rule
    // and a failed-transaction rule may fire for the same transaction, each
    // gated independently by its own cooldown (spec §9 Open Questions).
    if !transaction.success {
        let candidates: Vec<_> = index.type_candidates(RuleVariant::FailedTransaction).to_vec();
        for candidate in candidates {
            if candidate.matches_failed_transaction() {
                fire(tx, &candidate, transaction, None, now, &mut created).await?;
            }
        }
    }

    timer.stop(events.len());
    Ok(created)
}

async fn fire(
    tx: &mut Transaction<'_, Postgres>,
    rule: &RuleSnapshot,
    transaction: &TransactionRow,
    event_id: Option<i64>,
    now: chrono::DateTime<chrono::Utc>,
    created: &mut Vec<i64>,
) -> Result<(), sqlx::Error> {
    let won = rules_db::try_trigger_cooldown(tx, rule.id, now).await?;
    if !won {
        return Ok(());
    }

    for channel in &rule.channels {
        let message = build_message(rule, transaction, event_id, *channel, now);
        if let Some(id) =
            notifications::try_insert(tx, rule.id, transaction.id, event_id, *channel, &message, now).await?
        {
            created.push(id);
        }
    }

    Ok(())
}

fn build_message(
    rule: &RuleSnapshot,
    transaction: &TransactionRow,
    event_id: Option<i64>,
    channel: Channel,
    now: chrono::DateTime<chrono::Utc>,
) -> serde_json::Value {
    serde_json::json!({
        "alert_rule_id": rule.id,
        "alert_rule_name": rule.name,
        "severity": rule.severity,
        "transaction_id": transaction.id,
        "tx_id": transaction.tx_id,
        "event_id": event_id,
        "triggered_at": now,
        "recipient": channel_recipient(rule, channel),
    })
}

fn channel_recipient(rule: &RuleSnapshot, channel: Channel) -> Option<String> {
    match channel {
        Channel::Email => rule.emails.clone(),
        Channel::Webhook => rule.webhook_url.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_recipient_picks_matching_field() {
        let rule = RuleSnapshot {
            id: 1,
            name: "r".into(),
            variant: RuleVariant::TokenTransfer,
            contract_id: None,
            function_name: None,
            asset_id: None,
            watched_address: None,
            amount_threshold: None,
            severity: "info".into(),
            cooldown: std::time::Duration::from_secs(60),
            channels: vec![Channel::Email, Channel::Webhook],
            emails: Some("a@b.com".into()),
            webhook_url: Some("https://example.com/hook".into()),
        };
        assert_eq!(channel_recipient(&rule, Channel::Email).as_deref(), Some("a@b.com"));
        assert_eq!(
            channel_recipient(&rule, Channel::Webhook).as_deref(),
            Some("https://example.com/hook")
        );
    }
}
