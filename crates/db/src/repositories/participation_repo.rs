//! Repository for the `participations` table and the transactional
//! workflow steps built on it.
//!
//! Every multi-document step (capacity claim + insert, approve + stock +
//! ticket, terminate + restock) runs in one transaction. Row locks
//! (`SELECT ... FOR UPDATE`) serialize concurrent decisions on the same
//! participation; the capacity counter and stock decrements are
//! conditional updates, never read-then-write sequences.

use sqlx::{PgPool, Postgres, Transaction};

use eventra_core::inventory::MerchPurchase;
use eventra_core::status::{
    is_terminal, EVENT_TYPE_MERCH, PARTICIPATION_CANCELLED, PARTICIPATION_CONFIRMED,
    PARTICIPATION_PENDING, PARTICIPATION_REJECTED, PAYMENT_APPROVED, PAYMENT_PENDING,
    PAYMENT_REJECTED,
};
use eventra_core::ticket::{encode_qr_payload, TicketClaims};
use eventra_core::types::DbId;

use crate::models::participation::{NewParticipation, NewPayment, NewTicket, Participation};
use crate::models::payment::Payment;
use crate::models::ticket::Ticket;
use crate::repositories::{EventRepo, PaymentRepo, TicketRepo};

/// Column list for `participations` queries.
const COLUMNS: &str = "\
    id, event_id, user_id, status, event_type, ticket_id, \
    normal_responses, merch_purchase, created_at, updated_at";

/// A participation confirmed at creation, with its ticket.
#[derive(Debug)]
pub struct ConfirmedRegistration {
    pub participation: Participation,
    pub ticket: Ticket,
}

/// A pending participation awaiting a payment decision.
#[derive(Debug)]
pub struct PendingOrder {
    pub participation: Participation,
    pub payment: Payment,
}

/// Outcome of a payment approval attempt.
#[derive(Debug)]
pub enum ApproveOutcome {
    /// Stock reserved (MERCH), ticket issued, both records flipped.
    Approved {
        participation: Participation,
        payment: Payment,
        ticket: Ticket,
    },
    /// The variant no longer exists or has insufficient stock; the
    /// transaction rolled back and both records remain pending.
    InsufficientStock,
    /// The payment was already resolved; nothing changed.
    AlreadyResolved,
    /// Participation or payment record absent.
    NotFound,
}

/// Outcome of a cancel / staff-reject / payment-reject attempt.
#[derive(Debug)]
pub enum TerminateOutcome {
    /// The participation reached the target terminal status.
    Updated {
        participation: Participation,
        payment: Option<Payment>,
    },
    /// The record was already resolved; returned as-is.
    Unchanged(Participation),
    /// No such participation.
    NotFound,
}

pub struct ParticipationRepo;

impl ParticipationRepo {
    // ── Reads ───────────────────────────────────────────────────────

    /// Find a participation by primary key.
    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<Participation>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM participations WHERE id = $1");
        sqlx::query_as::<_, Participation>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a user's active (pending or confirmed) participation for an
    /// event. Used as a friendly pre-check; the partial unique index is
    /// the authoritative guard.
    pub async fn find_active(
        pool: &PgPool,
        event_id: DbId,
        user_id: DbId,
    ) -> Result<Option<Participation>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM participations \
             WHERE event_id = $1 AND user_id = $2 AND status IN ($3, $4)"
        );
        sqlx::query_as::<_, Participation>(&query)
            .bind(event_id)
            .bind(user_id)
            .bind(PARTICIPATION_PENDING)
            .bind(PARTICIPATION_CONFIRMED)
            .fetch_optional(pool)
            .await
    }

    /// List a user's participations, newest first.
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Vec<Participation>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM participations WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, Participation>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    /// List an event's participations, oldest first.
    pub async fn list_for_event(
        pool: &PgPool,
        event_id: DbId,
    ) -> Result<Vec<Participation>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM participations WHERE event_id = $1 ORDER BY created_at, id"
        );
        sqlx::query_as::<_, Participation>(&query)
            .bind(event_id)
            .fetch_all(pool)
            .await
    }

    // ── Creation (transitions 1 and 2) ──────────────────────────────

    /// Create a participation directly in `confirmed` and mint its
    /// ticket, all in one transaction (free NORMAL registrations).
    ///
    /// Returns `None` when the event is at capacity. A duplicate active
    /// participation aborts the transaction with a unique violation on
    /// `uq_participations_active`.
    pub async fn create_confirmed(
        pool: &PgPool,
        input: &NewParticipation,
        new_ticket: &NewTicket,
        qr_secret: &str,
    ) -> Result<Option<ConfirmedRegistration>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        if !EventRepo::claim_capacity(&mut tx, input.event_id).await? {
            return Ok(None);
        }

        let participation = Self::insert(
            &mut tx,
            input,
            PARTICIPATION_CONFIRMED,
            Some(&new_ticket.ticket_id),
        )
        .await?;

        let ticket = Self::mint_ticket(&mut tx, &participation, new_ticket, qr_secret).await?;

        tx.commit().await?;
        Ok(Some(ConfirmedRegistration {
            participation,
            ticket,
        }))
    }

    /// Create a `pending` participation plus its `pending` payment in
    /// one transaction (priced NORMAL registrations and all MERCH
    /// orders). No stock moves here.
    ///
    /// Returns `None` when the event is at capacity.
    pub async fn create_pending(
        pool: &PgPool,
        input: &NewParticipation,
        new_payment: &NewPayment,
    ) -> Result<Option<PendingOrder>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        if !EventRepo::claim_capacity(&mut tx, input.event_id).await? {
            return Ok(None);
        }

        let participation = Self::insert(&mut tx, input, PARTICIPATION_PENDING, None).await?;
        let payment = PaymentRepo::insert(&mut tx, participation.id, new_payment).await?;

        tx.commit().await?;
        Ok(Some(PendingOrder {
            participation,
            payment,
        }))
    }

    // ── Payment decisions (transitions 3 and 4) ─────────────────────

    /// Approve a pending payment: re-validate stock for MERCH, reserve
    /// it, mint the ticket, and flip both records, atomically.
    pub async fn approve_payment(
        pool: &PgPool,
        participation_id: DbId,
        new_ticket: &NewTicket,
        qr_secret: &str,
    ) -> Result<ApproveOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let Some(participation) = Self::lock_by_id(&mut tx, participation_id).await? else {
            return Ok(ApproveOutcome::NotFound);
        };
        let Some(payment) = PaymentRepo::lock_by_registration(&mut tx, participation_id).await?
        else {
            return Ok(ApproveOutcome::NotFound);
        };

        if payment.status != PAYMENT_PENDING || participation.status != PARTICIPATION_PENDING {
            return Ok(ApproveOutcome::AlreadyResolved);
        }

        // MERCH: the stock seen at request time may be gone by now.
        if participation.event_type == EVENT_TYPE_MERCH {
            let purchase = Self::purchase_snapshot(&participation)?;
            let reserved = EventRepo::reserve_stock(
                &mut tx,
                participation.event_id,
                &purchase.sku,
                purchase.quantity,
            )
            .await?;
            if !reserved {
                // Dropping the transaction rolls back; both records stay
                // pending for a manual retry.
                return Ok(ApproveOutcome::InsufficientStock);
            }
        }

        let confirmed = Self::set_confirmed(&mut tx, participation.id, &new_ticket.ticket_id).await?;
        let ticket = Self::mint_ticket(&mut tx, &confirmed, new_ticket, qr_secret).await?;
        let payment = PaymentRepo::set_status(&mut tx, payment.id, PAYMENT_APPROVED).await?;

        tx.commit().await?;
        Ok(ApproveOutcome::Approved {
            participation: confirmed,
            payment,
            ticket,
        })
    }

    /// Reject a pending payment: payment and participation both turn
    /// `rejected`, the capacity slot is released, stock is untouched
    /// (none was ever reserved for a pending order).
    ///
    /// An already-resolved payment is returned unchanged.
    pub async fn reject_payment(
        pool: &PgPool,
        participation_id: DbId,
    ) -> Result<TerminateOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let Some(participation) = Self::lock_by_id(&mut tx, participation_id).await? else {
            return Ok(TerminateOutcome::NotFound);
        };
        let Some(payment) = PaymentRepo::lock_by_registration(&mut tx, participation_id).await?
        else {
            return Ok(TerminateOutcome::NotFound);
        };

        if payment.status != PAYMENT_PENDING || is_terminal(&participation.status) {
            return Ok(TerminateOutcome::Unchanged(participation));
        }

        let (participation, payment) =
            Self::terminate_locked(&mut tx, participation, Some(payment), PARTICIPATION_REJECTED)
                .await?;
        tx.commit().await?;
        Ok(TerminateOutcome::Updated {
            participation,
            payment,
        })
    }

    // ── Cancellation / staff rejection (transitions 5 and 6) ────────

    /// Move a participation to a terminal status (`cancelled` for the
    /// owner, `rejected` for staff). Pending payments are rejected;
    /// ticketed MERCH orders get their stock restored; the capacity slot
    /// is released. Already-terminal records are returned unchanged.
    pub async fn terminate(
        pool: &PgPool,
        participation_id: DbId,
        target_status: &str,
    ) -> Result<TerminateOutcome, sqlx::Error> {
        debug_assert!(
            target_status == PARTICIPATION_CANCELLED || target_status == PARTICIPATION_REJECTED
        );

        let mut tx = pool.begin().await?;

        let Some(participation) = Self::lock_by_id(&mut tx, participation_id).await? else {
            return Ok(TerminateOutcome::NotFound);
        };
        if is_terminal(&participation.status) {
            return Ok(TerminateOutcome::Unchanged(participation));
        }

        let payment = PaymentRepo::lock_by_registration(&mut tx, participation_id).await?;
        let (participation, payment) =
            Self::terminate_locked(&mut tx, participation, payment, target_status).await?;

        tx.commit().await?;
        Ok(TerminateOutcome::Updated {
            participation,
            payment,
        })
    }

    // ── Internals ───────────────────────────────────────────────────

    async fn lock_by_id(
        tx: &mut Transaction<'_, Postgres>,
        id: DbId,
    ) -> Result<Option<Participation>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM participations WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, Participation>(&query)
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
    }

    async fn insert(
        tx: &mut Transaction<'_, Postgres>,
        input: &NewParticipation,
        status: &str,
        ticket_id: Option<&str>,
    ) -> Result<Participation, sqlx::Error> {
        let query = format!(
            "INSERT INTO participations \
                (event_id, user_id, status, event_type, ticket_id, \
                 normal_responses, merch_purchase) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Participation>(&query)
            .bind(input.event_id)
            .bind(input.user_id)
            .bind(status)
            .bind(&input.event_type)
            .bind(ticket_id)
            .bind(&input.normal_responses)
            .bind(&input.merch_purchase)
            .fetch_one(&mut **tx)
            .await
    }

    async fn set_confirmed(
        tx: &mut Transaction<'_, Postgres>,
        id: DbId,
        ticket_id: &str,
    ) -> Result<Participation, sqlx::Error> {
        let query = format!(
            "UPDATE participations \
                SET status = $2, ticket_id = $3, updated_at = now() \
              WHERE id = $1 \
              RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Participation>(&query)
            .bind(id)
            .bind(PARTICIPATION_CONFIRMED)
            .bind(ticket_id)
            .fetch_one(&mut **tx)
            .await
    }

    async fn set_status(
        tx: &mut Transaction<'_, Postgres>,
        id: DbId,
        status: &str,
    ) -> Result<Participation, sqlx::Error> {
        let query = format!(
            "UPDATE participations SET status = $2, updated_at = now() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Participation>(&query)
            .bind(id)
            .bind(status)
            .fetch_one(&mut **tx)
            .await
    }

    /// Shared terminal-transition body. Expects the participation (and
    /// payment, when present) to be locked and the participation to be
    /// non-terminal.
    async fn terminate_locked(
        tx: &mut Transaction<'_, Postgres>,
        participation: Participation,
        payment: Option<Payment>,
        target_status: &str,
    ) -> Result<(Participation, Option<Payment>), sqlx::Error> {
        let payment = match payment {
            Some(p) if p.status == PAYMENT_PENDING => {
                Some(PaymentRepo::set_status(tx, p.id, PAYMENT_REJECTED).await?)
            }
            other => other,
        };

        // Only confirmed (ticketed) merch orders ever reserved stock.
        if participation.ticket_id.is_some() && participation.event_type == EVENT_TYPE_MERCH {
            let purchase = Self::purchase_snapshot(&participation)?;
            EventRepo::restore_stock(tx, participation.event_id, &purchase.sku, purchase.quantity)
                .await?;
        }

        EventRepo::release_capacity(tx, participation.event_id).await?;
        let participation = Self::set_status(tx, participation.id, target_status).await?;
        Ok((participation, payment))
    }

    /// Mint the ticket for a participation being confirmed: derive the
    /// QR payload binding ticket, event, holder, and participation, and
    /// insert the immutable row.
    async fn mint_ticket(
        tx: &mut Transaction<'_, Postgres>,
        participation: &Participation,
        new_ticket: &NewTicket,
        qr_secret: &str,
    ) -> Result<Ticket, sqlx::Error> {
        let claims = TicketClaims {
            ticket_id: new_ticket.ticket_id.clone(),
            event_id: participation.event_id,
            user_id: participation.user_id,
            participation_id: participation.id,
            issued_at: new_ticket.issued_at.timestamp(),
        };
        let qr_payload = encode_qr_payload(&claims, qr_secret);

        TicketRepo::insert(
            tx,
            &new_ticket.ticket_id,
            participation.event_id,
            participation.user_id,
            participation.id,
            &participation.event_type,
            &qr_payload,
            new_ticket.issued_at,
        )
        .await
    }

    /// Decode the frozen purchase snapshot off a MERCH participation.
    fn purchase_snapshot(participation: &Participation) -> Result<MerchPurchase, sqlx::Error> {
        let value = participation
            .merch_purchase
            .clone()
            .ok_or_else(|| sqlx::Error::Decode("merch participation without purchase snapshot".into()))?;
        serde_json::from_value(value).map_err(|e| sqlx::Error::Decode(Box::new(e)))
    }
}
