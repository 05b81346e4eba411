//! Participation models and creation DTOs.

use eventra_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `participations` table.
///
/// `event_type` is a snapshot taken at creation, decoupled from the
/// event's current type. Exactly one of `normal_responses` or
/// `merch_purchase` is populated. `ticket_id` is set when a ticket has
/// been issued; cancelled/rejected are terminal.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Participation {
    pub id: DbId,
    pub event_id: DbId,
    pub user_id: DbId,
    pub status: String,
    pub event_type: String,
    pub ticket_id: Option<String>,
    pub normal_responses: Option<serde_json::Value>,
    pub merch_purchase: Option<serde_json::Value>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for inserting a new participation.
#[derive(Debug, Clone)]
pub struct NewParticipation {
    pub event_id: DbId,
    pub user_id: DbId,
    /// Snapshot of the event's type at creation.
    pub event_type: String,
    pub normal_responses: Option<serde_json::Value>,
    pub merch_purchase: Option<serde_json::Value>,
}

/// DTO for the payment record accompanying a priced participation.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub method: String,
    pub amount: i64,
    pub proof_url: Option<String>,
}

/// DTO for the ticket minted when a participation is confirmed. The
/// binding ids come from the participation row itself; the QR payload is
/// derived inside the confirming transaction.
#[derive(Debug, Clone)]
pub struct NewTicket {
    pub ticket_id: String,
    pub issued_at: Timestamp,
}
