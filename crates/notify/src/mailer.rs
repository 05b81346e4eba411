//! Background ticket mailer.
//!
//! [`TicketMailer`] subscribes to the [`EventBus`](crate::bus::EventBus)
//! and sends a confirmation email for every `participation.confirmed`
//! event. It runs as a long-lived spawned task off the request path:
//! nothing here can fail a participant's request. The loop exits when
//! the bus sender is dropped.

use tokio::sync::broadcast;

use eventra_db::repositories::{EventRepo, UserRepo};
use eventra_db::DbPool;

use crate::bus::{PlatformEvent, EVENT_PARTICIPATION_CONFIRMED};
use crate::delivery::email::{EmailConfig, EmailDelivery};

/// Background service that emails ticket confirmations.
pub struct TicketMailer {
    pool: DbPool,
    delivery: Option<EmailDelivery>,
}

impl TicketMailer {
    /// Build a mailer from the environment. Without SMTP configuration
    /// the mailer still consumes the bus but only logs what it would
    /// have sent.
    pub fn from_env(pool: DbPool) -> Self {
        let delivery = EmailConfig::from_env().map(EmailDelivery::new);
        if delivery.is_none() {
            tracing::info!("SMTP not configured; ticket emails will be logged only");
        }
        Self { pool, delivery }
    }

    /// Run the mailer loop until the bus closes.
    pub async fn run(self, mut receiver: broadcast::Receiver<PlatformEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) if event.event_type == EVENT_PARTICIPATION_CONFIRMED => {
                    // Best-effort by contract: log and move on.
                    if let Err(e) = self.send_confirmation(&event).await {
                        tracing::error!(
                            error = %e,
                            participation_id = ?event.source_entity_id,
                            "Failed to send ticket confirmation email"
                        );
                    }
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Ticket mailer lagged, some emails were skipped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, ticket mailer shutting down");
                    break;
                }
            }
        }
    }

    async fn send_confirmation(&self, event: &PlatformEvent) -> anyhow::Result<()> {
        let user_id = event
            .actor_user_id
            .ok_or_else(|| anyhow::anyhow!("confirmed event without a user id"))?;
        let ticket_id = event.payload["ticket_id"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("confirmed event without a ticket id"))?;
        let qr_payload = event.payload["qr_payload"].as_str().unwrap_or_default();

        let user = UserRepo::find_by_id(&self.pool, user_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("user {user_id} not found"))?;

        let event_name = match event.payload["event_id"].as_i64() {
            Some(event_id) => EventRepo::find_by_id(&self.pool, event_id)
                .await?
                .map(|e| e.name)
                .unwrap_or_else(|| "your event".to_string()),
            None => "your event".to_string(),
        };

        match &self.delivery {
            Some(delivery) => {
                delivery
                    .send_ticket_confirmation(&user.email, &event_name, ticket_id, qr_payload)
                    .await?;
            }
            None => {
                tracing::info!(
                    to = %user.email,
                    ticket_id,
                    event_name = %event_name,
                    "SMTP disabled; skipping ticket confirmation email"
                );
            }
        }
        Ok(())
    }
}
