//! Authentication and authorization middleware extractors.
//!
//! - [`auth::AuthUser`] -- Extracts the authenticated principal from a
//!   JWT Bearer token.
//! - [`rbac::RequireStaff`] -- Requires the `organizer` or `admin` role.

pub mod auth;
pub mod rbac;
