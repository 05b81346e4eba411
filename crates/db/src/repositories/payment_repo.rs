//! Repository for the `payments` table.
//!
//! Rows are created and resolved inside `ParticipationRepo`'s workflow
//! transactions; the `tx`-scoped methods here exist for that.

use sqlx::{PgPool, Postgres, Transaction};

use eventra_core::types::DbId;

use crate::models::participation::NewPayment;
use crate::models::payment::Payment;

/// Column list for `payments` queries.
const COLUMNS: &str =
    "id, registration_id, method, amount, proof_url, status, created_at, updated_at";

pub struct PaymentRepo;

impl PaymentRepo {
    /// Find the payment accompanying a participation.
    pub async fn find_by_registration(
        pool: &PgPool,
        registration_id: DbId,
    ) -> Result<Option<Payment>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM payments WHERE registration_id = $1");
        sqlx::query_as::<_, Payment>(&query)
            .bind(registration_id)
            .fetch_optional(pool)
            .await
    }

    /// Lock and load the payment for a participation within a workflow
    /// transaction.
    pub async fn lock_by_registration(
        tx: &mut Transaction<'_, Postgres>,
        registration_id: DbId,
    ) -> Result<Option<Payment>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM payments WHERE registration_id = $1 FOR UPDATE");
        sqlx::query_as::<_, Payment>(&query)
            .bind(registration_id)
            .fetch_optional(&mut **tx)
            .await
    }

    /// Insert a pending payment for a participation.
    pub async fn insert(
        tx: &mut Transaction<'_, Postgres>,
        registration_id: DbId,
        input: &NewPayment,
    ) -> Result<Payment, sqlx::Error> {
        let query = format!(
            "INSERT INTO payments (registration_id, method, amount, proof_url) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Payment>(&query)
            .bind(registration_id)
            .bind(&input.method)
            .bind(input.amount)
            .bind(&input.proof_url)
            .fetch_one(&mut **tx)
            .await
    }

    /// Flip a payment's status within a workflow transaction.
    pub async fn set_status(
        tx: &mut Transaction<'_, Postgres>,
        id: DbId,
        status: &str,
    ) -> Result<Payment, sqlx::Error> {
        let query = format!(
            "UPDATE payments SET status = $2, updated_at = now() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Payment>(&query)
            .bind(id)
            .bind(status)
            .fetch_one(&mut **tx)
            .await
    }
}
