//! Platform event bus and best-effort outbound notifications.
//!
//! Ticket-confirmation email is explicitly decoupled from the request
//! path: handlers publish a [`bus::PlatformEvent`] after their
//! transaction commits, and the spawned [`mailer::TicketMailer`] task
//! delivers email on its own time. A delivery failure is logged and
//! swallowed; it never surfaces to the participant's request.

pub mod bus;
pub mod delivery;
pub mod mailer;

pub use bus::{EventBus, PlatformEvent, EVENT_PARTICIPATION_CONFIRMED};
pub use mailer::TicketMailer;
