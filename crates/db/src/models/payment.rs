//! Payment record model.

use eventra_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `payments` table, 1:1 with a participation that
/// required money.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Payment {
    pub id: DbId,
    pub registration_id: DbId,
    pub method: String,
    pub amount: i64,
    pub proof_url: Option<String>,
    pub status: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
