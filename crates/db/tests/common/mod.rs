//! Shared seed helpers for repository tests.
//!
//! Users and events are provisioned by collaborators outside this core,
//! so tests seed them with plain inserts rather than repository calls.

// Not every test binary uses every helper.
#![allow(dead_code)]

use chrono::{Duration, Utc};
use sqlx::PgPool;

use eventra_db::models::participation::{NewParticipation, NewPayment, NewTicket};

pub const QR_SECRET: &str = "test-qr-secret";

pub async fn seed_user(pool: &PgPool, email: &str, category: &str) -> i64 {
    sqlx::query_scalar(
        "INSERT INTO users (email, display_name, category, role) \
         VALUES ($1, $2, $3, 'participant') RETURNING id",
    )
    .bind(email)
    .bind(email.split('@').next().unwrap())
    .bind(category)
    .fetch_one(pool)
    .await
    .expect("seed user")
}

pub async fn seed_organizer(pool: &PgPool, email: &str) -> i64 {
    sqlx::query_scalar(
        "INSERT INTO users (email, display_name, category, role) \
         VALUES ($1, $2, 'iiit', 'organizer') RETURNING id",
    )
    .bind(email)
    .bind(email.split('@').next().unwrap())
    .fetch_one(pool)
    .await
    .expect("seed organizer")
}

/// A published NORMAL event with an open registration window.
pub async fn seed_normal_event(
    pool: &PgPool,
    organizer_id: i64,
    reg_fee: i64,
    reg_limit: i32,
    form: serde_json::Value,
) -> i64 {
    let now = Utc::now();
    sqlx::query_scalar(
        "INSERT INTO events \
            (organizer_id, name, event_type, status, start_date, end_date, \
             reg_deadline, reg_limit, eligibility, reg_fee, normal_form) \
         VALUES ($1, 'Test Event', 'normal', 'published', $2, $3, $4, $5, 'all', $6, $7) \
         RETURNING id",
    )
    .bind(organizer_id)
    .bind(now + Duration::days(1))
    .bind(now + Duration::days(2))
    .bind(now + Duration::hours(12))
    .bind(reg_limit)
    .bind(reg_fee)
    .bind(form)
    .fetch_one(pool)
    .await
    .expect("seed normal event")
}

/// A published MERCH event with an open window and no variants yet.
pub async fn seed_merch_event(
    pool: &PgPool,
    organizer_id: i64,
    reg_fee: i64,
    per_participant_limit: i32,
    reg_limit: i32,
) -> i64 {
    let now = Utc::now();
    sqlx::query_scalar(
        "INSERT INTO events \
            (organizer_id, name, event_type, status, start_date, end_date, \
             reg_deadline, reg_limit, eligibility, reg_fee, per_participant_limit) \
         VALUES ($1, 'Merch Drop', 'merch', 'published', $2, $3, $4, $5, 'all', $6, $7) \
         RETURNING id",
    )
    .bind(organizer_id)
    .bind(now + Duration::days(1))
    .bind(now + Duration::days(2))
    .bind(now + Duration::hours(12))
    .bind(reg_limit)
    .bind(reg_fee)
    .bind(per_participant_limit)
    .fetch_one(pool)
    .await
    .expect("seed merch event")
}

/// Add a variant and refresh the event's cached total.
pub async fn seed_variant(pool: &PgPool, event_id: i64, sku: &str, stock: i32, price_delta: i64) {
    sqlx::query("INSERT INTO merch_variants (event_id, sku, stock, price_delta) VALUES ($1, $2, $3, $4)")
        .bind(event_id)
        .bind(sku)
        .bind(stock)
        .bind(price_delta)
        .execute(pool)
        .await
        .expect("seed variant");

    sqlx::query(
        "UPDATE events SET merch_total_stock = \
            (SELECT COALESCE(SUM(stock), 0) FROM merch_variants WHERE event_id = $1) \
         WHERE id = $1",
    )
    .bind(event_id)
    .execute(pool)
    .await
    .expect("refresh total stock");
}

pub fn new_normal_participation(event_id: i64, user_id: i64) -> NewParticipation {
    NewParticipation {
        event_id,
        user_id,
        event_type: "normal".to_string(),
        normal_responses: Some(serde_json::json!({"name": "Asha"})),
        merch_purchase: None,
    }
}

pub fn new_merch_participation(
    event_id: i64,
    user_id: i64,
    snapshot: &eventra_core::inventory::MerchPurchase,
) -> NewParticipation {
    NewParticipation {
        event_id,
        user_id,
        event_type: "merch".to_string(),
        normal_responses: None,
        merch_purchase: Some(serde_json::to_value(snapshot).unwrap()),
    }
}

pub fn new_payment(amount: i64) -> NewPayment {
    NewPayment {
        method: "upi".to_string(),
        amount,
        proof_url: Some("proof.png".to_string()),
    }
}

pub fn new_ticket() -> NewTicket {
    NewTicket {
        ticket_id: eventra_core::ticket::generate_ticket_id(Utc::now()),
        issued_at: Utc::now(),
    }
}

pub async fn variant_stock(pool: &PgPool, event_id: i64, sku: &str) -> i32 {
    sqlx::query_scalar("SELECT stock FROM merch_variants WHERE event_id = $1 AND sku = $2")
        .bind(event_id)
        .bind(sku)
        .fetch_one(pool)
        .await
        .expect("variant stock")
}

pub async fn total_stock(pool: &PgPool, event_id: i64) -> i32 {
    sqlx::query_scalar("SELECT merch_total_stock FROM events WHERE id = $1")
        .bind(event_id)
        .fetch_one(pool)
        .await
        .expect("total stock")
}

pub async fn active_registrations(pool: &PgPool, event_id: i64) -> i32 {
    sqlx::query_scalar("SELECT active_registrations FROM events WHERE id = $1")
        .bind(event_id)
        .fetch_one(pool)
        .await
        .expect("active registrations")
}
