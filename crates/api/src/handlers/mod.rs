//! Request handlers.
//!
//! Handlers run the gates in a fixed order (window, capacity,
//! eligibility, then form or stock checks), delegate the transactional
//! state-machine steps to `eventra_db` repositories, and map errors via
//! [`AppError`].
//!
//! [`AppError`]: crate::error::AppError

pub mod events;
pub mod participations;
pub mod tickets;
