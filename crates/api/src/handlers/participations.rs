//! Handlers for the participation workflow: register, purchase, cancel,
//! staff rejection, and payment resolution.
//!
//! Gates run in a fixed order (window, capacity, eligibility, then form
//! validation or stock checks) before anything is written. The
//! transactional transitions live in `ParticipationRepo`; these handlers
//! decide which transition applies, map outcomes to HTTP, and publish
//! the confirmation event that drives best-effort ticket email.

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use eventra_core::error::CoreError;
use eventra_core::roles::{ROLE_ADMIN, ROLE_PARTICIPANT};
use eventra_core::status::{
    EVENT_TYPE_MERCH, EVENT_TYPE_NORMAL, PARTICIPATION_CANCELLED, PARTICIPATION_REJECTED,
    PAYMENT_APPROVED, PAYMENT_REJECTED,
};
use eventra_core::ticket::generate_ticket_id;
use eventra_core::types::DbId;
use eventra_core::{eligibility, forms, inventory, window};
use eventra_db::models::event::Event;
use eventra_db::models::participation::{NewParticipation, NewPayment, NewTicket, Participation};
use eventra_db::models::payment::Payment;
use eventra_db::models::ticket::Ticket;
use eventra_db::models::user::User;
use eventra_db::repositories::participation_repo::{ApproveOutcome, TerminateOutcome};
use eventra_db::repositories::{EventRepo, ParticipationRepo, PaymentRepo, TicketRepo, UserRepo};
use eventra_notify::{PlatformEvent, EVENT_PARTICIPATION_CONFIRMED};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::RequireStaff;
use crate::response::DataResponse;
use crate::state::AppState;
use crate::uploads::{self, Submission};

/// A participation with whatever accompanies it on the current path.
#[derive(Debug, Serialize)]
pub struct ParticipationBundle {
    pub participation: Participation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<Payment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket: Option<Ticket>,
}

/// Request body for the payment resolution endpoint.
#[derive(Debug, Deserialize)]
pub struct ResolvePaymentRequest {
    /// `approved` or `rejected`.
    pub decision: String,
}

// ---------------------------------------------------------------------------
// Create (register / purchase)
// ---------------------------------------------------------------------------

/// POST /api/v1/participations/register
///
/// Register for a NORMAL event. Multipart body: `event_id`, one text
/// part per form answer, one file part per file field, and
/// `payment_method` + `payment_proof` when the event has a fee.
///
/// Free events confirm immediately and return the ticket; priced events
/// return a pending participation plus its pending payment.
pub async fn register(
    auth: AuthUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    let submission = uploads::collect(multipart, &state.config.upload_dir).await?;
    match register_inner(&state, &auth, &submission).await {
        Ok(response) => Ok(response),
        Err(err) => {
            // A rejected request must leave no orphaned uploads behind.
            submission.discard().await;
            Err(err)
        }
    }
}

async fn register_inner(
    state: &AppState,
    auth: &AuthUser,
    submission: &Submission,
) -> AppResult<(StatusCode, Json<DataResponse<ParticipationBundle>>)> {
    ensure_participant(auth)?;
    let user = load_user(state, auth.user_id).await?;
    let event = load_submitted_event(state, submission).await?;

    if event.event_type != EVENT_TYPE_NORMAL {
        return Err(CoreError::Validation(
            "This event sells merchandise; use the purchase endpoint".to_string(),
        )
        .into());
    }
    run_common_gates(state, &event, &user).await?;

    let form_value = event.normal_form.as_ref().ok_or_else(|| {
        CoreError::Internal(format!("Event {} has no registration form", event.id))
    })?;
    let fields = forms::parse_form(form_value)?;
    let responses = forms::validate_submission(&fields, &submission.answers, &submission.files)?;

    let new_participation = NewParticipation {
        event_id: event.id,
        user_id: user.id,
        event_type: event.event_type.clone(),
        normal_responses: Some(serde_json::Value::Object(responses)),
        merch_purchase: None,
    };

    if event.reg_fee > 0 {
        // Payment-gated: confirmation waits for a manual decision.
        let new_payment = pending_payment(submission, event.reg_fee)?;
        let order = ParticipationRepo::create_pending(&state.pool, &new_participation, &new_payment)
            .await?
            .ok_or_else(window::capacity_error)?;

        tracing::info!(
            user_id = user.id,
            event_id = event.id,
            participation_id = order.participation.id,
            amount = order.payment.amount,
            "Registration pending payment approval"
        );

        Ok((
            StatusCode::CREATED,
            Json(DataResponse {
                data: ParticipationBundle {
                    participation: order.participation,
                    payment: Some(order.payment),
                    ticket: None,
                },
            }),
        ))
    } else {
        // Free registration: confirm and issue the ticket in one step.
        let confirmed = ParticipationRepo::create_confirmed(
            &state.pool,
            &new_participation,
            &fresh_ticket(),
            &state.config.qr_secret,
        )
        .await?
        .ok_or_else(window::capacity_error)?;

        publish_confirmed(state, &confirmed.participation, &confirmed.ticket);
        tracing::info!(
            user_id = user.id,
            event_id = event.id,
            participation_id = confirmed.participation.id,
            ticket_id = %confirmed.ticket.ticket_id,
            "Registration confirmed"
        );

        Ok((
            StatusCode::CREATED,
            Json(DataResponse {
                data: ParticipationBundle {
                    participation: confirmed.participation,
                    payment: None,
                    ticket: Some(confirmed.ticket),
                },
            }),
        ))
    }
}

/// POST /api/v1/participations/purchase
///
/// Place a MERCH order. Multipart body: `event_id`, `sku`, `quantity`,
/// `payment_method`, `payment_proof`. The order is created pending; no
/// stock moves until the payment is approved.
pub async fn purchase(
    auth: AuthUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    let submission = uploads::collect(multipart, &state.config.upload_dir).await?;
    match purchase_inner(&state, &auth, &submission).await {
        Ok(response) => Ok(response),
        Err(err) => {
            submission.discard().await;
            Err(err)
        }
    }
}

async fn purchase_inner(
    state: &AppState,
    auth: &AuthUser,
    submission: &Submission,
) -> AppResult<(StatusCode, Json<DataResponse<ParticipationBundle>>)> {
    ensure_participant(auth)?;
    let user = load_user(state, auth.user_id).await?;
    let event = load_submitted_event(state, submission).await?;

    if event.event_type != EVENT_TYPE_MERCH {
        return Err(CoreError::Validation(
            "This event takes form registrations; use the register endpoint".to_string(),
        )
        .into());
    }
    run_common_gates(state, &event, &user).await?;

    let sku = submission
        .text("sku")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| CoreError::Validation("sku is required".to_string()))?;
    let quantity: i32 = submission
        .text("quantity")
        .ok_or_else(|| CoreError::Validation("quantity is required".to_string()))?
        .trim()
        .parse()
        .map_err(|_| CoreError::Validation("quantity must be an integer".to_string()))?;

    inventory::ensure_quantity_allowed(quantity, event.per_participant_limit)?;

    let variant = EventRepo::find_variant(&state.pool, event.id, sku)
        .await?
        .ok_or_else(|| CoreError::Validation(format!("Unknown variant '{sku}'")))?;
    // Availability check only; the reservation happens at approval. A
    // quantity the shelf cannot cover is a malformed order, not a race.
    if variant.stock < quantity {
        return Err(CoreError::Validation(format!(
            "Only {} of '{sku}' available",
            variant.stock
        ))
        .into());
    }

    let snapshot = inventory::purchase_snapshot(sku, quantity, event.reg_fee, variant.price_delta);
    let new_payment = pending_payment(submission, snapshot.total)?;
    let new_participation = NewParticipation {
        event_id: event.id,
        user_id: user.id,
        event_type: event.event_type.clone(),
        normal_responses: None,
        merch_purchase: Some(
            serde_json::to_value(&snapshot)
                .map_err(|e| CoreError::Internal(format!("Snapshot encoding: {e}")))?,
        ),
    };

    let order = ParticipationRepo::create_pending(&state.pool, &new_participation, &new_payment)
        .await?
        .ok_or_else(window::capacity_error)?;

    tracing::info!(
        user_id = user.id,
        event_id = event.id,
        participation_id = order.participation.id,
        sku,
        quantity,
        total = snapshot.total,
        "Merch order placed, pending payment approval"
    );

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: ParticipationBundle {
                participation: order.participation,
                payment: Some(order.payment),
                ticket: None,
            },
        }),
    ))
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// GET /api/v1/participations/mine
///
/// List the caller's participations, newest first.
pub async fn my_participations(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let participations = ParticipationRepo::list_for_user(&state.pool, auth.user_id).await?;
    Ok(Json(DataResponse {
        data: participations,
    }))
}

/// GET /api/v1/participations/{id}
///
/// Fetch one participation with its payment and ticket. Visible to its
/// owner, the owning event's organizer, and admins.
pub async fn get_participation(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let participation = load_participation(&state, id).await?;

    if participation.user_id != auth.user_id {
        let event = load_event(&state, participation.event_id).await?;
        ensure_staff_owns_event(&auth, &event)?;
    }

    let payment = PaymentRepo::find_by_registration(&state.pool, participation.id).await?;
    let ticket = TicketRepo::find_by_participation(&state.pool, participation.id).await?;
    Ok(Json(DataResponse {
        data: ParticipationBundle {
            participation,
            payment,
            ticket,
        },
    }))
}

// ---------------------------------------------------------------------------
// Cancel / staff reject
// ---------------------------------------------------------------------------

/// PATCH /api/v1/participations/{id}/cancel
///
/// Cancel the caller's own participation. Pending payments are
/// rejected; a ticketed merch order restores its stock. Cancelling an
/// already-terminal participation returns it unchanged.
pub async fn cancel(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let participation = load_participation(&state, id).await?;
    // Someone else's participation is indistinguishable from a missing one.
    if participation.user_id != auth.user_id {
        return Err(CoreError::NotFound {
            entity: "Participation",
            id,
        }
        .into());
    }

    let outcome = ParticipationRepo::terminate(&state.pool, id, PARTICIPATION_CANCELLED).await?;
    let bundle = terminate_bundle(&state, outcome, id).await?;
    tracing::info!(user_id = auth.user_id, participation_id = id, "Participation cancelled");
    Ok(Json(DataResponse { data: bundle }))
}

/// PATCH /api/v1/participations/{id}/reject
///
/// Staff rejection: same effects as a cancel, but any non-terminal
/// participation qualifies and the terminal status is `rejected`.
/// Organizers may only act on participations of their own events.
pub async fn reject(
    RequireStaff(auth): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let participation = load_participation(&state, id).await?;
    let event = load_event(&state, participation.event_id).await?;
    ensure_staff_owns_event(&auth, &event)?;

    let outcome = ParticipationRepo::terminate(&state.pool, id, PARTICIPATION_REJECTED).await?;
    let bundle = terminate_bundle(&state, outcome, id).await?;
    tracing::info!(
        staff_user_id = auth.user_id,
        participation_id = id,
        "Participation rejected by staff"
    );
    Ok(Json(DataResponse { data: bundle }))
}

// ---------------------------------------------------------------------------
// Payment resolution
// ---------------------------------------------------------------------------

/// PATCH /api/v1/participations/{id}/payment
///
/// Resolve a pending payment. `approved` reserves stock (MERCH), mints
/// the ticket, and confirms; `rejected` turns both records terminal.
/// Approving an already-resolved payment is a conflict; rejecting one
/// returns the current state unchanged.
pub async fn resolve_payment(
    RequireStaff(auth): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<ResolvePaymentRequest>,
) -> AppResult<impl IntoResponse> {
    let participation = load_participation(&state, id).await?;
    let event = load_event(&state, participation.event_id).await?;
    ensure_staff_owns_event(&auth, &event)?;

    match input.decision.as_str() {
        PAYMENT_APPROVED => {
            let outcome = ParticipationRepo::approve_payment(
                &state.pool,
                id,
                &fresh_ticket(),
                &state.config.qr_secret,
            )
            .await?;

            match outcome {
                ApproveOutcome::Approved {
                    participation,
                    payment,
                    ticket,
                } => {
                    publish_confirmed(&state, &participation, &ticket);
                    tracing::info!(
                        staff_user_id = auth.user_id,
                        participation_id = participation.id,
                        ticket_id = %ticket.ticket_id,
                        "Payment approved, ticket issued"
                    );
                    Ok(Json(DataResponse {
                        data: ParticipationBundle {
                            participation,
                            payment: Some(payment),
                            ticket: Some(ticket),
                        },
                    }))
                }
                ApproveOutcome::InsufficientStock => Err(CoreError::Conflict(
                    "Insufficient stock to approve this order; it remains pending".to_string(),
                )
                .into()),
                ApproveOutcome::AlreadyResolved => Err(CoreError::Conflict(
                    "Payment has already been resolved".to_string(),
                )
                .into()),
                ApproveOutcome::NotFound => Err(CoreError::NotFound {
                    entity: "Payment",
                    id,
                }
                .into()),
            }
        }
        PAYMENT_REJECTED => {
            let outcome = ParticipationRepo::reject_payment(&state.pool, id).await?;
            let bundle = terminate_bundle(&state, outcome, id).await?;
            tracing::info!(
                staff_user_id = auth.user_id,
                participation_id = id,
                "Payment rejected"
            );
            Ok(Json(DataResponse { data: bundle }))
        }
        other => Err(CoreError::Validation(format!(
            "Invalid decision '{other}'. Must be one of: {PAYMENT_APPROVED}, {PAYMENT_REJECTED}"
        ))
        .into()),
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

fn ensure_participant(auth: &AuthUser) -> Result<(), AppError> {
    if auth.role != ROLE_PARTICIPANT {
        return Err(CoreError::Forbidden("Participant role required".to_string()).into());
    }
    Ok(())
}

/// Organizers act only on their own events; admins act anywhere.
pub(crate) fn ensure_staff_owns_event(auth: &AuthUser, event: &Event) -> Result<(), AppError> {
    if auth.role == ROLE_ADMIN || event.organizer_id == auth.user_id {
        Ok(())
    } else {
        Err(CoreError::Forbidden(
            "You may only manage participations of your own events".to_string(),
        )
        .into())
    }
}

async fn load_user(state: &AppState, id: DbId) -> AppResult<User> {
    UserRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| CoreError::NotFound { entity: "User", id }.into())
}

async fn load_event(state: &AppState, id: DbId) -> AppResult<Event> {
    EventRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| CoreError::NotFound { entity: "Event", id }.into())
}

async fn load_participation(state: &AppState, id: DbId) -> AppResult<Participation> {
    ParticipationRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| {
            CoreError::NotFound {
                entity: "Participation",
                id,
            }
            .into()
        })
}

async fn load_submitted_event(state: &AppState, submission: &Submission) -> AppResult<Event> {
    let event_id = submission
        .event_id
        .ok_or_else(|| AppError::BadRequest("event_id is required".to_string()))?;
    load_event(state, event_id).await
}

/// The gates shared by register and purchase, in order: window,
/// capacity pre-check, eligibility, duplicate pre-check. The capacity
/// and duplicate checks here produce friendly errors; the storage layer
/// (conditional counter claim, partial unique index) stays authoritative
/// under races.
async fn run_common_gates(state: &AppState, event: &Event, user: &User) -> Result<(), AppError> {
    window::ensure_registration_open(&event.status, event.reg_deadline, event.end_date, Utc::now())?;
    if event.active_registrations >= event.reg_limit {
        return Err(window::capacity_error().into());
    }
    eligibility::ensure_eligible(&event.eligibility, &user.category)?;
    if ParticipationRepo::find_active(&state.pool, event.id, user.id)
        .await?
        .is_some()
    {
        return Err(CoreError::Conflict(
            "You already have an active participation for this event".to_string(),
        )
        .into());
    }
    Ok(())
}

/// Validate the payment fields required whenever money changes hands.
fn pending_payment(submission: &Submission, amount: i64) -> Result<NewPayment, AppError> {
    let method = submission
        .payment_method
        .clone()
        .filter(|m| !m.is_empty())
        .ok_or_else(|| CoreError::Validation("payment_method is required".to_string()))?;
    let proof = submission
        .payment_proof
        .as_ref()
        .ok_or_else(|| CoreError::Validation("A payment proof upload is required".to_string()))?;

    Ok(NewPayment {
        method,
        amount,
        proof_url: Some(proof.file_name.clone()),
    })
}

/// A ticket identity for a confirmation happening right now.
fn fresh_ticket() -> NewTicket {
    let now = Utc::now();
    NewTicket {
        ticket_id: generate_ticket_id(now),
        issued_at: now,
    }
}

/// Map a terminate outcome to a response bundle, treating already-
/// resolved records as success (idempotent cancel/reject).
async fn terminate_bundle(
    state: &AppState,
    outcome: TerminateOutcome,
    id: DbId,
) -> Result<ParticipationBundle, AppError> {
    match outcome {
        TerminateOutcome::Updated {
            participation,
            payment,
        } => Ok(ParticipationBundle {
            participation,
            payment,
            ticket: None,
        }),
        TerminateOutcome::Unchanged(participation) => {
            let payment = PaymentRepo::find_by_registration(&state.pool, participation.id).await?;
            Ok(ParticipationBundle {
                participation,
                payment,
                ticket: None,
            })
        }
        TerminateOutcome::NotFound => Err(CoreError::NotFound {
            entity: "Participation",
            id,
        }
        .into()),
    }
}

/// Publish the confirmation event that drives best-effort ticket email.
/// The request's success no longer depends on anything downstream.
fn publish_confirmed(state: &AppState, participation: &Participation, ticket: &Ticket) {
    state.bus.publish(
        PlatformEvent::new(EVENT_PARTICIPATION_CONFIRMED)
            .with_source("participation", participation.id)
            .with_actor(participation.user_id)
            .with_payload(json!({
                "ticket_id": ticket.ticket_id,
                "qr_payload": ticket.qr_payload,
                "event_id": participation.event_id,
            })),
    );
}
