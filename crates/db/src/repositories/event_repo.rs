//! Repository for events and the merch variant catalogue.
//!
//! Event CRUD belongs to the organizer tooling outside this core; here
//! events are read, and variant stock is moved with conditional updates.
//! `merch_total_stock` is recomputed inside the same transaction as
//! every stock mutation, never written independently.

use sqlx::{PgPool, Postgres, Transaction};

use eventra_core::types::DbId;
use eventra_core::window::STATUS_PUBLISHED;

use crate::models::event::{Event, MerchVariant};

/// Column list for `events` queries.
const EVENT_COLUMNS: &str = "\
    id, organizer_id, name, description, event_type, status, \
    start_date, end_date, reg_deadline, reg_limit, active_registrations, \
    eligibility, reg_fee, normal_form, per_participant_limit, \
    merch_total_stock, created_at, updated_at";

/// Column list for `merch_variants` queries.
const VARIANT_COLUMNS: &str =
    "id, event_id, sku, label, stock, price_delta, created_at, updated_at";

pub struct EventRepo;

impl EventRepo {
    /// Find an event by primary key.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Event>, sqlx::Error> {
        let query = format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = $1");
        sqlx::query_as::<_, Event>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List published events, soonest start first.
    pub async fn list_published(pool: &PgPool) -> Result<Vec<Event>, sqlx::Error> {
        let query = format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE status = $1 ORDER BY start_date, id"
        );
        sqlx::query_as::<_, Event>(&query)
            .bind(STATUS_PUBLISHED)
            .fetch_all(pool)
            .await
    }

    /// List an event's variants in catalogue order.
    pub async fn list_variants(
        pool: &PgPool,
        event_id: DbId,
    ) -> Result<Vec<MerchVariant>, sqlx::Error> {
        let query =
            format!("SELECT {VARIANT_COLUMNS} FROM merch_variants WHERE event_id = $1 ORDER BY sku");
        sqlx::query_as::<_, MerchVariant>(&query)
            .bind(event_id)
            .fetch_all(pool)
            .await
    }

    /// Find one variant by (event, sku).
    pub async fn find_variant(
        pool: &PgPool,
        event_id: DbId,
        sku: &str,
    ) -> Result<Option<MerchVariant>, sqlx::Error> {
        let query =
            format!("SELECT {VARIANT_COLUMNS} FROM merch_variants WHERE event_id = $1 AND sku = $2");
        sqlx::query_as::<_, MerchVariant>(&query)
            .bind(event_id)
            .bind(sku)
            .fetch_optional(pool)
            .await
    }

    /// Atomically decrement a variant's stock, guarded by availability.
    ///
    /// Returns `false` when the variant does not exist or has fewer than
    /// `quantity` units left; no rows change in that case. Recomputes the
    /// event's cached total in the same transaction on success.
    pub async fn reserve_stock(
        tx: &mut Transaction<'_, Postgres>,
        event_id: DbId,
        sku: &str,
        quantity: i32,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE merch_variants \
                SET stock = stock - $3, updated_at = now() \
              WHERE event_id = $1 AND sku = $2 AND stock >= $3",
        )
        .bind(event_id)
        .bind(sku)
        .bind(quantity)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }
        Self::recompute_total_stock(tx, event_id).await?;
        Ok(true)
    }

    /// Add previously reserved stock back to a variant and recompute the
    /// cached total. Invoked only for participations that actually
    /// decremented stock (confirmed, ticketed orders).
    pub async fn restore_stock(
        tx: &mut Transaction<'_, Postgres>,
        event_id: DbId,
        sku: &str,
        quantity: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE merch_variants \
                SET stock = stock + $3, updated_at = now() \
              WHERE event_id = $1 AND sku = $2",
        )
        .bind(event_id)
        .bind(sku)
        .bind(quantity)
        .execute(&mut **tx)
        .await?;

        Self::recompute_total_stock(tx, event_id).await
    }

    /// Rewrite the cached `merch_total_stock` as the sum of variant
    /// stocks. Always runs in the mutating transaction.
    async fn recompute_total_stock(
        tx: &mut Transaction<'_, Postgres>,
        event_id: DbId,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE events \
                SET merch_total_stock = (\
                    SELECT COALESCE(SUM(stock), 0) FROM merch_variants WHERE event_id = $1\
                ), \
                    updated_at = now() \
              WHERE id = $1",
        )
        .bind(event_id)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Claim one capacity slot: a conditional increment that only
    /// succeeds while the active count is below the limit. Returns
    /// `false` when the event is full.
    pub async fn claim_capacity(
        tx: &mut Transaction<'_, Postgres>,
        event_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE events \
                SET active_registrations = active_registrations + 1, updated_at = now() \
              WHERE id = $1 AND active_registrations < reg_limit",
        )
        .bind(event_id)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Release one capacity slot when a participation turns terminal.
    pub async fn release_capacity(
        tx: &mut Transaction<'_, Postgres>,
        event_id: DbId,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE events \
                SET active_registrations = GREATEST(active_registrations - 1, 0), \
                    updated_at = now() \
              WHERE id = $1",
        )
        .bind(event_id)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}
