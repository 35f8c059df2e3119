//! Immutable rule snapshot — the value type matched against transactions
//! (spec §4.5, §9). Attached to the index at build time; never a virtual
//! call, just a plain value with a pure predicate method.

use std::time::Duration;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};

use crate::db::models::{Channel, RuleRow, RuleVariant};

#[derive(Debug, Clone)]
pub struct RuleSnapshot {
    pub id: i64,
    pub name: String,
    pub variant: RuleVariant,
    pub contract_id: Option<String>,
    pub function_name: Option<String>,
    pub asset_id: Option<String>,
    pub watched_address: Option<String>,
    pub amount_threshold: Option<BigDecimal>,
    pub severity: String,
    pub cooldown: Duration,
    pub channels: Vec<Channel>,
    pub emails: Option<String>,
    pub webhook_url: Option<String>,
}

impl RuleSnapshot {
    pub fn from_row(row: &RuleRow) -> Self {
        Self {
            id: row.id,
            name: row.name.clone(),
            variant: row.variant,
            contract_id: row.contract_id.clone(),
            function_name: row.function_name.clone(),
            asset_id: row.asset_id.clone(),
            watched_address: row.watched_address.clone(),
            amount_threshold: row.amount_threshold.clone(),
            severity: row.severity.clone(),
            cooldown: Duration::from_secs(row.cooldown_seconds.max(0) as u64),
            channels: row.channel_list(),
            emails: row.emails.clone(),
            webhook_url: row.webhook_url.clone(),
        }
    }

    /// `now − cooldown_duration` (GLOSSARY: "Cooldown window start").
    pub fn cooldown_window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - chrono::Duration::from_std(self.cooldown).unwrap_or(chrono::Duration::zero())
    }

    /// Pure predicate: does this candidate actually match the given
    /// transaction context? Index lookup narrows candidates; this confirms.
    pub fn matches_contract_call(&self, contract_id: &str, function_name: &str) -> bool {
        self.variant == RuleVariant::ContractCall
            && self.contract_id.as_deref() == Some(contract_id)
            && self
                .function_name
                .as_deref()
                .map(|f| f == "*" || f == function_name)
                .unwrap_or(true)
    }

    pub fn matches_token_transfer(&self, asset_id: &str, amount: Option<&BigDecimal>) -> bool {
        if self.variant != RuleVariant::TokenTransfer {
            return false;
        }
        if self.asset_id.as_deref() != Some(asset_id) {
            return false;
        }
        match (&self.amount_threshold, amount) {
            (Some(threshold), Some(amount)) => amount >= threshold,
            (Some(_), None) => false,
            (None, _) => true,
        }
    }

    pub fn matches_print_event(&self) -> bool {
        self.variant == RuleVariant::PrintEvent
    }

    pub fn matches_failed_transaction(&self) -> bool {
        self.variant == RuleVariant::FailedTransaction
    }

    pub fn matches_address_activity(&self, addresses: &[&str]) -> bool {
        self.variant == RuleVariant::AddressActivity
            && self
                .watched_address
                .as_deref()
                .map(|watched| addresses.contains(&watched))
                .unwrap_or(false)
    }
}
