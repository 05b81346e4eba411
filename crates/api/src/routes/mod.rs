pub mod events;
pub mod health;
pub mod participations;
pub mod tickets;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /events                              list published events
/// /events/{id}                         event detail (form / variants)
/// /events/{id}/participations          staff participation listing
///
/// /participations/register             NORMAL registration (multipart)
/// /participations/purchase             MERCH order (multipart)
/// /participations/mine                 caller's participations
/// /participations/{id}                 participation detail
/// /participations/{id}/cancel          owner cancellation (PATCH)
/// /participations/{id}/reject          staff rejection (PATCH)
/// /participations/{id}/payment         payment resolution (PATCH)
///
/// /tickets/{ticket_id}/verify          QR payload verification
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/events", events::router())
        .nest("/participations", participations::router())
        .nest("/tickets", tickets::router())
}
