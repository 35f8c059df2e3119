//! Channel handler contract (spec §4.8).

pub mod email;
pub mod webhook;

use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    /// Non-2xx / MTA rejection — counts toward the retry budget.
    Transient,
    /// Malformed recipient — terminal, no point retrying.
    InvalidRecipient,
    Timeout,
}

#[async_trait]
pub trait ChannelHandler: Send + Sync {
    async fn send(&self, notification: &NotificationPayload) -> Result<(), SendError>;
}

/// Everything a channel handler needs to compose and send a message,
/// assembled from the notification row + its denormalized message JSON.
#[derive(Debug, Clone)]
pub struct NotificationPayload {
    pub notification_id: i64,
    pub triggered_at: chrono::DateTime<chrono::Utc>,
    pub alert_rule_id: i64,
    pub alert_rule_name: String,
    pub severity: String,
    pub recipient: Option<String>,
    pub tx_id: String,
    pub sender: String,
    pub success: bool,
    pub block_height: i64,
    pub event: Option<EventSummary>,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct EventSummary {
    pub variant: String,
    pub event_index: i32,
    pub contract_identifier: Option<String>,
    pub description: String,
}
