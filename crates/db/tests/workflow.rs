//! Integration tests for the participation workflow: creation paths,
//! payment decisions, terminal transitions, and their idempotence.

mod common;

use assert_matches::assert_matches;
use sqlx::PgPool;

use common::*;
use eventra_core::inventory::purchase_snapshot;
use eventra_core::ticket::decode_qr_payload;
use eventra_db::repositories::participation_repo::{ApproveOutcome, TerminateOutcome};
use eventra_db::repositories::{ParticipationRepo, PaymentRepo, TicketRepo};

fn simple_form() -> serde_json::Value {
    serde_json::json!([
        {"key": "name", "type": "text", "required": true, "order": 1}
    ])
}

#[sqlx::test(migrations = "./migrations")]
async fn free_registration_confirms_and_issues_ticket(pool: PgPool) {
    let organizer = seed_organizer(&pool, "org@example.com").await;
    let user = seed_user(&pool, "asha@example.com", "iiit").await;
    let event = seed_normal_event(&pool, organizer, 0, 10, simple_form()).await;

    let confirmed = ParticipationRepo::create_confirmed(
        &pool,
        &new_normal_participation(event, user),
        &new_ticket(),
        QR_SECRET,
    )
    .await
    .unwrap()
    .expect("capacity available");

    assert_eq!(confirmed.participation.status, "confirmed");
    assert_eq!(
        confirmed.participation.ticket_id.as_deref(),
        Some(confirmed.ticket.ticket_id.as_str())
    );
    assert_eq!(active_registrations(&pool, event).await, 1);

    // The QR payload decodes back to the identity recorded on the ticket.
    let claims = decode_qr_payload(&confirmed.ticket.qr_payload, QR_SECRET).unwrap();
    assert_eq!(claims.ticket_id, confirmed.ticket.ticket_id);
    assert_eq!(claims.event_id, event);
    assert_eq!(claims.user_id, user);
    assert_eq!(claims.participation_id, confirmed.participation.id);
}

#[sqlx::test(migrations = "./migrations")]
async fn duplicate_active_participation_hits_unique_constraint(pool: PgPool) {
    let organizer = seed_organizer(&pool, "org@example.com").await;
    let user = seed_user(&pool, "asha@example.com", "iiit").await;
    let event = seed_normal_event(&pool, organizer, 0, 10, simple_form()).await;

    ParticipationRepo::create_confirmed(
        &pool,
        &new_normal_participation(event, user),
        &new_ticket(),
        QR_SECRET,
    )
    .await
    .unwrap()
    .expect("first registration succeeds");

    let err = ParticipationRepo::create_confirmed(
        &pool,
        &new_normal_participation(event, user),
        &new_ticket(),
        QR_SECRET,
    )
    .await
    .expect_err("second registration must violate the active-participation index");

    assert_matches!(
        &err,
        sqlx::Error::Database(db) if db.constraint() == Some("uq_participations_active")
    );
    // The losing transaction rolled back: the capacity slot it claimed
    // was released with it.
    assert_eq!(active_registrations(&pool, event).await, 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn capacity_limit_refuses_the_second_user(pool: PgPool) {
    let organizer = seed_organizer(&pool, "org@example.com").await;
    let first = seed_user(&pool, "a@example.com", "iiit").await;
    let second = seed_user(&pool, "b@example.com", "iiit").await;
    let event = seed_normal_event(&pool, organizer, 0, 1, simple_form()).await;

    ParticipationRepo::create_confirmed(
        &pool,
        &new_normal_participation(event, first),
        &new_ticket(),
        QR_SECRET,
    )
    .await
    .unwrap()
    .expect("first registration fills the event");

    let refused = ParticipationRepo::create_confirmed(
        &pool,
        &new_normal_participation(event, second),
        &new_ticket(),
        QR_SECRET,
    )
    .await
    .unwrap();
    assert!(refused.is_none(), "full event must refuse the claim");
    assert_eq!(active_registrations(&pool, event).await, 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn cancelled_slot_frees_capacity_for_the_next_user(pool: PgPool) {
    let organizer = seed_organizer(&pool, "org@example.com").await;
    let first = seed_user(&pool, "a@example.com", "iiit").await;
    let second = seed_user(&pool, "b@example.com", "iiit").await;
    let event = seed_normal_event(&pool, organizer, 0, 1, simple_form()).await;

    let confirmed = ParticipationRepo::create_confirmed(
        &pool,
        &new_normal_participation(event, first),
        &new_ticket(),
        QR_SECRET,
    )
    .await
    .unwrap()
    .unwrap();

    let outcome = ParticipationRepo::terminate(&pool, confirmed.participation.id, "cancelled")
        .await
        .unwrap();
    assert_matches!(outcome, TerminateOutcome::Updated { ref participation, .. }
        if participation.status == "cancelled");
    assert_eq!(active_registrations(&pool, event).await, 0);

    ParticipationRepo::create_confirmed(
        &pool,
        &new_normal_participation(event, second),
        &new_ticket(),
        QR_SECRET,
    )
    .await
    .unwrap()
    .expect("freed slot admits the next registration");
}

#[sqlx::test(migrations = "./migrations")]
async fn approving_a_merch_order_reserves_stock_and_mints_one_ticket(pool: PgPool) {
    let organizer = seed_organizer(&pool, "org@example.com").await;
    let user = seed_user(&pool, "asha@example.com", "iiit").await;
    let event = seed_merch_event(&pool, organizer, 200, 5, 10).await;
    seed_variant(&pool, event, "tee-m", 3, 50).await;

    let snapshot = purchase_snapshot("tee-m", 2, 200, 50);
    let order = ParticipationRepo::create_pending(
        &pool,
        &new_merch_participation(event, user, &snapshot),
        &new_payment(snapshot.total),
    )
    .await
    .unwrap()
    .expect("capacity available");

    // A pending order holds no stock.
    assert_eq!(variant_stock(&pool, event, "tee-m").await, 3);
    assert_eq!(order.payment.status, "pending");
    assert_eq!(order.payment.amount, 500);

    let outcome =
        ParticipationRepo::approve_payment(&pool, order.participation.id, &new_ticket(), QR_SECRET)
            .await
            .unwrap();
    let ticket = match outcome {
        ApproveOutcome::Approved {
            participation,
            payment,
            ticket,
        } => {
            assert_eq!(participation.status, "confirmed");
            assert_eq!(payment.status, "approved");
            ticket
        }
        other => panic!("expected approval, got {other:?}"),
    };

    assert_eq!(variant_stock(&pool, event, "tee-m").await, 1);
    assert_eq!(total_stock(&pool, event).await, 1);

    // A second approve must not double-issue or double-decrement.
    let again =
        ParticipationRepo::approve_payment(&pool, order.participation.id, &new_ticket(), QR_SECRET)
            .await
            .unwrap();
    assert_matches!(again, ApproveOutcome::AlreadyResolved);
    assert_eq!(variant_stock(&pool, event, "tee-m").await, 1);

    let stored = TicketRepo::find_by_participation(&pool, order.participation.id)
        .await
        .unwrap()
        .expect("one ticket exists");
    assert_eq!(stored.ticket_id, ticket.ticket_id);
}

#[sqlx::test(migrations = "./migrations")]
async fn approval_with_insufficient_stock_leaves_both_records_pending(pool: PgPool) {
    let organizer = seed_organizer(&pool, "org@example.com").await;
    let winner = seed_user(&pool, "a@example.com", "iiit").await;
    let loser = seed_user(&pool, "b@example.com", "iiit").await;
    let event = seed_merch_event(&pool, organizer, 100, 5, 10).await;
    seed_variant(&pool, event, "mug", 2, 0).await;

    let snapshot = purchase_snapshot("mug", 2, 100, 0);
    let first = ParticipationRepo::create_pending(
        &pool,
        &new_merch_participation(event, winner, &snapshot),
        &new_payment(snapshot.total),
    )
    .await
    .unwrap()
    .unwrap();
    let second = ParticipationRepo::create_pending(
        &pool,
        &new_merch_participation(event, loser, &snapshot),
        &new_payment(snapshot.total),
    )
    .await
    .unwrap()
    .unwrap();

    // The first approval consumes the remaining stock.
    let outcome =
        ParticipationRepo::approve_payment(&pool, first.participation.id, &new_ticket(), QR_SECRET)
            .await
            .unwrap();
    assert_matches!(outcome, ApproveOutcome::Approved { .. });
    assert_eq!(variant_stock(&pool, event, "mug").await, 0);

    // The second approval finds the shelf empty and changes nothing.
    let outcome =
        ParticipationRepo::approve_payment(&pool, second.participation.id, &new_ticket(), QR_SECRET)
            .await
            .unwrap();
    assert_matches!(outcome, ApproveOutcome::InsufficientStock);

    let participation = ParticipationRepo::find_by_id(&pool, second.participation.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(participation.status, "pending");
    let payment = PaymentRepo::find_by_registration(&pool, second.participation.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, "pending");
}

#[sqlx::test(migrations = "./migrations")]
async fn cancelling_a_pending_order_never_touches_stock(pool: PgPool) {
    let organizer = seed_organizer(&pool, "org@example.com").await;
    let user = seed_user(&pool, "asha@example.com", "iiit").await;
    let event = seed_merch_event(&pool, organizer, 100, 5, 10).await;
    seed_variant(&pool, event, "cap", 4, 0).await;

    let snapshot = purchase_snapshot("cap", 3, 100, 0);
    let order = ParticipationRepo::create_pending(
        &pool,
        &new_merch_participation(event, user, &snapshot),
        &new_payment(snapshot.total),
    )
    .await
    .unwrap()
    .unwrap();

    let outcome = ParticipationRepo::terminate(&pool, order.participation.id, "cancelled")
        .await
        .unwrap();
    let (participation, payment) = match outcome {
        TerminateOutcome::Updated {
            participation,
            payment,
        } => (participation, payment),
        other => panic!("expected update, got {other:?}"),
    };

    assert_eq!(participation.status, "cancelled");
    assert_eq!(payment.unwrap().status, "rejected");
    assert_eq!(variant_stock(&pool, event, "cap").await, 4);
    assert_eq!(active_registrations(&pool, event).await, 0);
}

#[sqlx::test(migrations = "./migrations")]
async fn cancelling_a_confirmed_order_restores_the_reserved_quantity(pool: PgPool) {
    let organizer = seed_organizer(&pool, "org@example.com").await;
    let user = seed_user(&pool, "asha@example.com", "iiit").await;
    let event = seed_merch_event(&pool, organizer, 100, 5, 10).await;
    seed_variant(&pool, event, "tee-l", 3, 0).await;

    let snapshot = purchase_snapshot("tee-l", 2, 100, 0);
    let order = ParticipationRepo::create_pending(
        &pool,
        &new_merch_participation(event, user, &snapshot),
        &new_payment(snapshot.total),
    )
    .await
    .unwrap()
    .unwrap();

    let outcome =
        ParticipationRepo::approve_payment(&pool, order.participation.id, &new_ticket(), QR_SECRET)
            .await
            .unwrap();
    assert_matches!(outcome, ApproveOutcome::Approved { .. });
    assert_eq!(variant_stock(&pool, event, "tee-l").await, 1);

    let outcome = ParticipationRepo::terminate(&pool, order.participation.id, "cancelled")
        .await
        .unwrap();
    assert_matches!(outcome, TerminateOutcome::Updated { ref participation, .. }
        if participation.status == "cancelled");

    // Exactly the reserved quantity comes back.
    assert_eq!(variant_stock(&pool, event, "tee-l").await, 3);
    assert_eq!(total_stock(&pool, event).await, 3);

    // Terminal transitions are idempotent: a repeat returns the record
    // unchanged and restores nothing twice.
    let outcome = ParticipationRepo::terminate(&pool, order.participation.id, "cancelled")
        .await
        .unwrap();
    assert_matches!(outcome, TerminateOutcome::Unchanged(_));
    assert_eq!(variant_stock(&pool, event, "tee-l").await, 3);
}

#[sqlx::test(migrations = "./migrations")]
async fn rejecting_a_pending_payment_turns_both_records_terminal(pool: PgPool) {
    let organizer = seed_organizer(&pool, "org@example.com").await;
    let user = seed_user(&pool, "asha@example.com", "iiit").await;
    let event = seed_normal_event(&pool, organizer, 150, 10, simple_form()).await;

    let order = ParticipationRepo::create_pending(
        &pool,
        &new_normal_participation(event, user),
        &new_payment(150),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(order.participation.status, "pending");

    let outcome = ParticipationRepo::reject_payment(&pool, order.participation.id)
        .await
        .unwrap();
    let (participation, payment) = match outcome {
        TerminateOutcome::Updated {
            participation,
            payment,
        } => (participation, payment),
        other => panic!("expected update, got {other:?}"),
    };
    assert_eq!(participation.status, "rejected");
    assert_eq!(payment.unwrap().status, "rejected");
    assert_eq!(active_registrations(&pool, event).await, 0);

    // Rejecting an already-resolved payment is a no-op.
    let outcome = ParticipationRepo::reject_payment(&pool, order.participation.id)
        .await
        .unwrap();
    assert_matches!(outcome, TerminateOutcome::Unchanged(ref p) if p.status == "rejected");
}

#[sqlx::test(migrations = "./migrations")]
async fn terminating_a_missing_participation_reports_not_found(pool: PgPool) {
    let outcome = ParticipationRepo::terminate(&pool, 999_999, "cancelled")
        .await
        .unwrap();
    assert_matches!(outcome, TerminateOutcome::NotFound);
}
