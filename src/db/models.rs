//! Row structs mapped 1:1 onto the tables in spec §6.2 via `sqlx::FromRow`.
//!
//! Variant fields for events and rules are flattened onto the row (the
//! polymorphic-variant tables described in spec §9) rather than modeled as
//! separate tables; the `variant`/`kind` column discriminates which fields
//! are meaningful, matching the teacher's preference for plain structs over
//! a trait-object hierarchy.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BlockRow {
    pub id: i64,
    pub block_hash: String,
    pub height: i64,
    pub parent_hash: String,
    pub timestamp: DateTime<Utc>,
    pub deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub version: i32,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TransactionRow {
    pub id: i64,
    pub tx_id: String,
    pub block_id: i64,
    pub sender: String,
    pub success: bool,
    pub position: i32,
    pub nonce: i64,
    pub fee: BigDecimal,
    pub cost_compute: Option<i64>,
    pub cost_memory: Option<i64>,
    pub deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum EventVariant {
    FtTransfer,
    FtMint,
    FtBurn,
    NftTransfer,
    NftMint,
    NftBurn,
    StxTransfer,
    StxMint,
    StxBurn,
    StxLock,
    SmartContractLog,
}

impl EventVariant {
    pub fn is_token_transfer(self) -> bool {
        matches!(
            self,
            EventVariant::FtTransfer
                | EventVariant::NftTransfer
                | EventVariant::StxTransfer
        )
    }

    pub fn is_print_event(self) -> bool {
        matches!(self, EventVariant::SmartContractLog)
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EventRow {
    pub id: i64,
    pub transaction_id: i64,
    pub event_index: i32,
    pub variant: EventVariant,
    pub asset_id: Option<String>,
    pub amount: Option<BigDecimal>,
    pub sender: Option<String>,
    pub recipient: Option<String>,
    pub topic: Option<String>,
    pub decoded_value: Option<serde_json::Value>,
    pub deleted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum RuleVariant {
    ContractCall,
    TokenTransfer,
    FailedTransaction,
    PrintEvent,
    AddressActivity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum Channel {
    Email,
    Webhook,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RuleRow {
    pub id: i64,
    pub user_id: Uuid,
    pub name: String,
    pub variant: RuleVariant,
    pub contract_id: Option<String>,
    pub function_name: Option<String>,
    pub asset_id: Option<String>,
    pub watched_address: Option<String>,
    pub amount_threshold: Option<BigDecimal>,
    pub severity: String,
    pub cooldown_seconds: i64,
    /// `channels` is stored as a comma-joined text column; see `channel_list`.
    pub channels: String,
    pub emails: Option<String>,
    pub webhook_url: Option<String>,
    pub active: bool,
    pub last_triggered_at: Option<DateTime<Utc>>,
    pub version: i32,
}

impl RuleRow {
    pub fn channel_list(&self) -> Vec<Channel> {
        self.channels
            .split(',')
            .filter(|s| !s.is_empty())
            .filter_map(|s| match s {
                "email" => Some(Channel::Email),
                "webhook" => Some(Channel::Webhook),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum NotificationStatus {
    Pending,
    Delivering,
    Delivered,
    Retrying,
    DeadLetter,
    Failed,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct NotificationRow {
    pub id: i64,
    pub rule_id: i64,
    pub transaction_id: i64,
    pub event_id: Option<i64>,
    pub channel: Channel,
    pub status: NotificationStatus,
    pub attempt_count: i32,
    pub first_attempt_at: Option<DateTime<Utc>>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub message: serde_json::Value,
    pub invalidated: bool,
    pub invalidated_at: Option<DateTime<Utc>>,
    pub invalidation_reason: Option<String>,
    pub triggered_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum ProcessingStatus {
    Pending,
    Processed,
    Failed,
    Rejected,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RawWebhookRow {
    pub id: i64,
    pub request_id: Uuid,
    pub received_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub headers: serde_json::Value,
    pub payload: serde_json::Value,
    pub processing_status: ProcessingStatus,
    pub error_message: Option<String>,
    pub error_trace: Option<String>,
    pub source_addr: String,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum FailureReason {
    CircuitOpen,
    MaxRetriesExceeded,
    Timeout,
    InvalidRecipient,
    NoHandler,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DlqRow {
    pub id: i64,
    pub notification_id: i64,
    pub alert_rule_id: i64,
    pub alert_rule_name: String,
    pub channel: Channel,
    pub recipient: String,
    pub failure_reason: FailureReason,
    pub error_message: Option<String>,
    pub error_trace: Option<String>,
    pub attempt_count: i32,
    pub first_attempt_at: Option<DateTime<Utc>>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub queued_at: DateTime<Utc>,
    pub processed: bool,
    pub processed_at: Option<DateTime<Utc>>,
    pub processed_by: Option<String>,
    pub resolution_notes: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RevokedTokenRow {
    pub id: i64,
    pub digest: String,
    pub user_email: String,
    pub revocation_reason: String,
    pub revoked_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
