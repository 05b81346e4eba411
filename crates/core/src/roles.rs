//! Well-known role name constants.
//!
//! These must match the seed data in the `users` migration.

pub const ROLE_PARTICIPANT: &str = "participant";
pub const ROLE_ORGANIZER: &str = "organizer";
pub const ROLE_ADMIN: &str = "admin";

/// True for roles allowed to resolve payments and reject participations.
pub fn is_staff(role: &str) -> bool {
    role == ROLE_ORGANIZER || role == ROLE_ADMIN
}
