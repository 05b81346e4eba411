//! Ticket verification handler.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use eventra_core::ticket::{verify_qr_payload, TicketClaims};
use eventra_db::models::ticket::Ticket;
use eventra_db::repositories::TicketRepo;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Verification result for a ticket lookup.
#[derive(Debug, Serialize)]
pub struct TicketVerification {
    /// Whether the stored QR payload matches a re-derivation from the
    /// ticket's recorded identity.
    pub valid: bool,
    pub ticket: Ticket,
}

/// GET /api/v1/tickets/{ticket_id}/verify
///
/// Look up a ticket by its public id and check its QR payload by
/// re-deriving the encoding and comparing.
pub async fn verify_ticket(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(ticket_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let ticket = TicketRepo::find_by_ticket_id(&state.pool, &ticket_id)
        .await?
        .ok_or(AppError::Database(sqlx::Error::RowNotFound))?;

    let claims = TicketClaims {
        ticket_id: ticket.ticket_id.clone(),
        event_id: ticket.event_id,
        user_id: ticket.user_id,
        participation_id: ticket.participation_id,
        issued_at: ticket.issued_at.timestamp(),
    };
    let valid = verify_qr_payload(&claims, &ticket.qr_payload, &state.config.qr_secret);

    Ok(Json(DataResponse {
        data: TicketVerification { valid, ticket },
    }))
}
