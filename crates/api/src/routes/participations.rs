//! Route definitions for the `/participations` resource.

use axum::routing::{get, patch, post};
use axum::Router;

use crate::handlers::participations;
use crate::state::AppState;

/// Routes mounted at `/participations`.
///
/// ```text
/// POST  /register        -> NORMAL registration (multipart)
/// POST  /purchase        -> MERCH order (multipart)
/// GET   /mine            -> caller's participations
/// GET   /{id}            -> participation detail
/// PATCH /{id}/cancel     -> owner cancellation
/// PATCH /{id}/reject     -> staff rejection
/// PATCH /{id}/payment    -> payment resolution (approve / reject)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(participations::register))
        .route("/purchase", post(participations::purchase))
        .route("/mine", get(participations::my_participations))
        .route("/{id}", get(participations::get_participation))
        .route("/{id}/cancel", patch(participations::cancel))
        .route("/{id}/reject", patch(participations::reject))
        .route("/{id}/payment", patch(participations::resolve_payment))
}
