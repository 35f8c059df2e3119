//! Webhook handler (spec §4.8): POSTs the outbound JSON payload; a 2xx
//! response is success, anything else is a failure.

use async_trait::async_trait;
use serde_json::json;

use super::{ChannelHandler, NotificationPayload, SendError};

pub struct WebhookHandler {
    client: reqwest::Client,
    timeout: std::time::Duration,
}

impl WebhookHandler {
    pub fn new(client: reqwest::Client, timeout: std::time::Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl ChannelHandler for WebhookHandler {
    async fn send(&self, notification: &NotificationPayload) -> Result<(), SendError> {
        let Some(url) = notification.recipient.as_ref() else {
            return Err(SendError::InvalidRecipient);
        };
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(SendError::InvalidRecipient);
        }

        let body = json!({
            "notification_id": notification.notification_id,
            "triggered_at": notification.triggered_at,
            "alert_rule_id": notification.alert_rule_id,
            "alert_rule_name": notification.alert_rule_name,
            "severity": notification.severity,
            "transaction": {
                "tx_id": notification.tx_id,
                "sender": notification.sender,
                "success": notification.success,
                "block_height": notification.block_height,
            },
            "event": notification.event.as_ref().map(|e| json!({
                "variant": e.variant,
                "event_index": e.event_index,
                "contract_identifier": e.contract_identifier,
                "description": e.description,
            })),
            "message": notification.message,
            "timestamp": chrono::Utc::now(),
        });

        let response = self
            .client
            .post(url)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SendError::Timeout
                } else {
                    SendError::Transient
                }
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(SendError::Transient)
        }
    }
}
