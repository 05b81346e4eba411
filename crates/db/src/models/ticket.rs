//! Ticket model.

use eventra_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `tickets` table. Immutable once created; exactly one
/// per confirmed participation.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Ticket {
    pub id: DbId,
    pub ticket_id: String,
    pub event_id: DbId,
    pub user_id: DbId,
    pub participation_id: DbId,
    pub event_type: String,
    pub qr_payload: String,
    pub issued_at: Timestamp,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
