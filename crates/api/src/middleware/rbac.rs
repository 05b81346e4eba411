//! Role-based access control extractors.
//!
//! Staff-only routes (payment decisions, staff rejection, participant
//! listings) take [`RequireStaff`] instead of re-checking the role in
//! every handler. Per-event ownership (an organizer may only act on
//! participations of their own events) still happens in the handler,
//! because it needs the event row.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use eventra_core::error::CoreError;
use eventra_core::roles::is_staff;

use super::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

/// Requires the `organizer` or `admin` role. Rejects with 403 otherwise.
///
/// ```ignore
/// async fn staff_only(RequireStaff(user): RequireStaff) -> AppResult<Json<()>> {
///     // user is guaranteed to be an organizer or admin here
///     Ok(Json(()))
/// }
/// ```
pub struct RequireStaff(pub AuthUser);

impl FromRequestParts<AppState> for RequireStaff {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !is_staff(&user.role) {
            return Err(AppError::Core(CoreError::Forbidden(
                "Organizer or admin role required".into(),
            )));
        }
        Ok(RequireStaff(user))
    }
}
