//! Status and type vocabulary for the participation workflow.
//!
//! These must match the CHECK constraints in the participations and
//! payments migrations.

/// Awaiting a payment decision.
pub const PARTICIPATION_PENDING: &str = "pending";
/// Confirmed; a ticket has been issued.
pub const PARTICIPATION_CONFIRMED: &str = "confirmed";
/// Terminal: withdrawn by the participant.
pub const PARTICIPATION_CANCELLED: &str = "cancelled";
/// Terminal: rejected by staff (directly or via a payment decision).
pub const PARTICIPATION_REJECTED: &str = "rejected";

/// True for statuses that permit no further transition.
pub fn is_terminal(status: &str) -> bool {
    status == PARTICIPATION_CANCELLED || status == PARTICIPATION_REJECTED
}

pub const PAYMENT_PENDING: &str = "pending";
pub const PAYMENT_APPROVED: &str = "approved";
pub const PAYMENT_REJECTED: &str = "rejected";

/// Event with an organizer-defined registration form.
pub const EVENT_TYPE_NORMAL: &str = "normal";
/// Event selling catalogue variants with limited stock.
pub const EVENT_TYPE_MERCH: &str = "merch";
