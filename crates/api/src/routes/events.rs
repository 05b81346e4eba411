//! Route definitions for the `/events` resource (read-only).

use axum::routing::get;
use axum::Router;

use crate::handlers::events;
use crate::state::AppState;

/// Routes mounted at `/events`.
///
/// ```text
/// GET /                        -> list published events
/// GET /{id}                    -> event detail (form / variants)
/// GET /{id}/participations     -> staff participation listing
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(events::list_events))
        .route("/{id}", get(events::get_event))
        .route("/{id}/participations", get(events::list_event_participations))
}
