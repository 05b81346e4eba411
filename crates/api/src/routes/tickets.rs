//! Route definitions for the `/tickets` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::tickets;
use crate::state::AppState;

/// Routes mounted at `/tickets`.
///
/// ```text
/// GET /{ticket_id}/verify    -> QR payload verification
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/{ticket_id}/verify", get(tickets::verify_ticket))
}
