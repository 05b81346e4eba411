//! Event and merch variant models.

use eventra_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `events` table.
///
/// Exactly one of `normal_form` (NORMAL events) or the variant set in
/// `merch_variants` (MERCH events) is populated. `merch_total_stock` is
/// a cached sum of variant stocks, recomputed on every mutation.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Event {
    pub id: DbId,
    pub organizer_id: DbId,
    pub name: String,
    pub description: Option<String>,
    pub event_type: String,
    pub status: String,
    pub start_date: Timestamp,
    pub end_date: Timestamp,
    pub reg_deadline: Timestamp,
    pub reg_limit: i32,
    /// Number of non-terminal participations; the capacity counter.
    pub active_registrations: i32,
    pub eligibility: String,
    /// Base fee in the smallest currency unit.
    pub reg_fee: i64,
    pub normal_form: Option<serde_json::Value>,
    pub per_participant_limit: i32,
    pub merch_total_stock: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A row from the `merch_variants` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MerchVariant {
    pub id: DbId,
    pub event_id: DbId,
    pub sku: String,
    pub label: Option<String>,
    pub stock: i32,
    /// Added to the event's base fee; unit price floors at zero.
    pub price_delta: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
