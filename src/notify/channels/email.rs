//! Email handler (spec §4.8): subject `"[<severity>] <rule_name>"`, body is
//! the notification message, recipients are a comma-separated or
//! structured list.

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use super::{ChannelHandler, NotificationPayload, SendError};

pub struct EmailHandler {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl EmailHandler {
    pub fn new(transport: AsyncSmtpTransport<Tokio1Executor>, from: &str) -> Result<Self, anyhow::Error> {
        Ok(Self {
            transport,
            from: from.parse()?,
        })
    }
}

#[async_trait]
impl ChannelHandler for EmailHandler {
    async fn send(&self, notification: &NotificationPayload) -> Result<(), SendError> {
        let Some(recipients) = notification.recipient.as_ref() else {
            return Err(SendError::InvalidRecipient);
        };

        let subject = format!("[{}] {}", notification.severity, notification.alert_rule_name);

        let mut builder = Message::builder().from(self.from.clone()).subject(subject);

        let mut any_recipient = false;
        for addr in recipients.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let mailbox: Mailbox = match addr.parse() {
                Ok(m) => m,
                Err(_) => return Err(SendError::InvalidRecipient),
            };
            builder = builder.to(mailbox);
            any_recipient = true;
        }
        if !any_recipient {
            return Err(SendError::InvalidRecipient);
        }

        let email = builder
            .body(notification.message.clone())
            .map_err(|_| SendError::InvalidRecipient)?;

        self.transport
            .send(email)
            .await
            .map(|_| ())
            .map_err(|_| SendError::Transient)
    }
}
