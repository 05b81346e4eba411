//! Repository for the `tickets` table. Tickets are insert-only; they are
//! minted inside the transaction that confirms a participation and never
//! mutated afterwards.

use sqlx::{PgPool, Postgres, Transaction};

use eventra_core::types::{DbId, Timestamp};

use crate::models::ticket::Ticket;

/// Column list for `tickets` queries.
const COLUMNS: &str = "\
    id, ticket_id, event_id, user_id, participation_id, event_type, \
    qr_payload, issued_at, created_at, updated_at";

pub struct TicketRepo;

impl TicketRepo {
    /// Insert a freshly minted ticket within a confirming transaction.
    #[allow(clippy::too_many_arguments)]
    pub async fn insert(
        tx: &mut Transaction<'_, Postgres>,
        ticket_id: &str,
        event_id: DbId,
        user_id: DbId,
        participation_id: DbId,
        event_type: &str,
        qr_payload: &str,
        issued_at: Timestamp,
    ) -> Result<Ticket, sqlx::Error> {
        let query = format!(
            "INSERT INTO tickets \
                (ticket_id, event_id, user_id, participation_id, event_type, \
                 qr_payload, issued_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Ticket>(&query)
            .bind(ticket_id)
            .bind(event_id)
            .bind(user_id)
            .bind(participation_id)
            .bind(event_type)
            .bind(qr_payload)
            .bind(issued_at)
            .fetch_one(&mut **tx)
            .await
    }

    /// Find a ticket by its public ticket id.
    pub async fn find_by_ticket_id(
        pool: &PgPool,
        ticket_id: &str,
    ) -> Result<Option<Ticket>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM tickets WHERE ticket_id = $1");
        sqlx::query_as::<_, Ticket>(&query)
            .bind(ticket_id)
            .fetch_optional(pool)
            .await
    }

    /// Find the ticket issued for a participation, if any.
    pub async fn find_by_participation(
        pool: &PgPool,
        participation_id: DbId,
    ) -> Result<Option<Ticket>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM tickets WHERE participation_id = $1");
        sqlx::query_as::<_, Ticket>(&query)
            .bind(participation_id)
            .fetch_optional(pool)
            .await
    }
}
