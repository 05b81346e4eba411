//! User rows. Provisioned by the external identity service; read-only
//! to this core.

use eventra_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `users` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: DbId,
    pub email: String,
    pub display_name: String,
    /// Participant category matched against event eligibility
    /// (e.g. `iiit` / `non-iiit`).
    pub category: String,
    pub role: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
