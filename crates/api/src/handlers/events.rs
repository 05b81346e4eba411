//! Read-only event handlers.
//!
//! Event CRUD belongs to the organizer tooling outside this core; these
//! endpoints expose published events to participants (with the derived
//! display status) and participation listings to staff.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use eventra_core::error::CoreError;
use eventra_core::status::EVENT_TYPE_MERCH;
use eventra_core::types::{DbId, Timestamp};
use eventra_core::window;
use eventra_db::models::event::{Event, MerchVariant};
use eventra_db::repositories::{EventRepo, ParticipationRepo};

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::RequireStaff;
use crate::response::DataResponse;
use crate::state::AppState;

/// An event as served to clients: the persisted row plus the derived,
/// time-sensitive display status.
#[derive(Debug, Serialize)]
pub struct EventView {
    #[serde(flatten)]
    pub event: Event,
    pub display_status: String,
    /// Variant catalogue; empty for NORMAL events.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub variants: Vec<MerchVariant>,
}

fn event_view(event: Event, variants: Vec<MerchVariant>, now: Timestamp) -> EventView {
    let display_status =
        window::display_status(&event.status, event.start_date, event.end_date, now).to_string();
    EventView {
        event,
        display_status,
        variants,
    }
}

/// GET /api/v1/events
///
/// List published events, soonest first.
pub async fn list_events(
    _auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let events = EventRepo::list_published(&state.pool).await?;
    let now = Utc::now();
    let data: Vec<EventView> = events
        .into_iter()
        .map(|e| event_view(e, Vec::new(), now))
        .collect();
    Ok(Json(DataResponse { data }))
}

/// GET /api/v1/events/{id}
///
/// Fetch one event with its form schema or variant catalogue.
pub async fn get_event(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let event = EventRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(CoreError::NotFound { entity: "Event", id })?;

    let variants = if event.event_type == EVENT_TYPE_MERCH {
        EventRepo::list_variants(&state.pool, event.id).await?
    } else {
        Vec::new()
    };

    Ok(Json(DataResponse {
        data: event_view(event, variants, Utc::now()),
    }))
}

/// GET /api/v1/events/{id}/participations
///
/// List an event's participations. Admins see any event; organizers only
/// their own.
pub async fn list_event_participations(
    RequireStaff(auth): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let event = EventRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(CoreError::NotFound { entity: "Event", id })?;
    super::participations::ensure_staff_owns_event(&auth, &event)?;

    let participations = ParticipationRepo::list_for_event(&state.pool, event.id).await?;
    Ok(Json(DataResponse {
        data: participations,
    }))
}
