//! Registration window rules and derived event display status.
//!
//! An event accepts new participations only while it is published and
//! neither the registration deadline nor the event end has passed. The
//! capacity ceiling itself is enforced by a conditional write in the
//! storage layer; this module only provides the pre-check message.

use crate::error::CoreError;
use crate::types::Timestamp;

/// Event is being drafted and is not visible to participants.
pub const STATUS_DRAFT: &str = "draft";

/// Event is live and accepting participations (window permitting).
pub const STATUS_PUBLISHED: &str = "published";

/// Event was closed by its organizer before completion.
pub const STATUS_CLOSED: &str = "closed";

/// Event has concluded. This status is sticky; no further change is allowed.
pub const STATUS_COMPLETED: &str = "completed";

/// Derived-only status: published and currently running.
pub const DISPLAY_ONGOING: &str = "ongoing";

/// All persisted event statuses.
pub const VALID_STATUSES: &[&str] = &[
    STATUS_DRAFT,
    STATUS_PUBLISHED,
    STATUS_CLOSED,
    STATUS_COMPLETED,
];

/// Check that an event is open for registration/purchase at `now`.
///
/// Requires `status == published`, `now <= reg_deadline`, and
/// `now <= end_date`. The error message names the first failing gate.
pub fn ensure_registration_open(
    status: &str,
    reg_deadline: Timestamp,
    end_date: Timestamp,
    now: Timestamp,
) -> Result<(), CoreError> {
    if status != STATUS_PUBLISHED {
        return Err(CoreError::Validation(format!(
            "Event is not open for registration (status: {status})"
        )));
    }
    if now > reg_deadline {
        return Err(CoreError::Validation(
            "Registration deadline has passed".to_string(),
        ));
    }
    if now > end_date {
        return Err(CoreError::Validation("Event has ended".to_string()));
    }
    Ok(())
}

/// Derive the display status for an event at `now`.
///
/// A published event that is currently running (between start and end)
/// displays as `ongoing`; everything else displays its persisted status.
pub fn display_status(
    status: &str,
    start_date: Timestamp,
    end_date: Timestamp,
    now: Timestamp,
) -> &str {
    if status == STATUS_PUBLISHED && now >= start_date && now <= end_date {
        DISPLAY_ONGOING
    } else {
        status
    }
}

/// Pre-check message for a full event. The authoritative capacity gate is
/// the conditional counter claim in the storage layer.
pub fn capacity_error() -> CoreError {
    CoreError::Conflict("Event has reached its registration limit".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::{Duration, Utc};

    #[test]
    fn open_when_published_and_before_deadline() {
        let now = Utc::now();
        let deadline = now + Duration::hours(1);
        let end = now + Duration::days(1);
        assert!(ensure_registration_open(STATUS_PUBLISHED, deadline, end, now).is_ok());
    }

    #[test]
    fn rejected_when_not_published() {
        let now = Utc::now();
        let deadline = now + Duration::hours(1);
        let end = now + Duration::days(1);
        for status in [STATUS_DRAFT, STATUS_CLOSED, STATUS_COMPLETED] {
            let err = ensure_registration_open(status, deadline, end, now).unwrap_err();
            assert_matches!(err, CoreError::Validation(_));
        }
    }

    #[test]
    fn rejected_after_deadline() {
        let now = Utc::now();
        let deadline = now - Duration::seconds(1);
        let end = now + Duration::days(1);
        let err = ensure_registration_open(STATUS_PUBLISHED, deadline, end, now).unwrap_err();
        assert_matches!(err, CoreError::Validation(msg) if msg.contains("deadline"));
    }

    #[test]
    fn rejected_after_event_end() {
        let now = Utc::now();
        let deadline = now + Duration::hours(1);
        let end = now - Duration::seconds(1);
        let err = ensure_registration_open(STATUS_PUBLISHED, deadline, end, now).unwrap_err();
        assert_matches!(err, CoreError::Validation(msg) if msg.contains("ended"));
    }

    #[test]
    fn deadline_boundary_is_inclusive() {
        let now = Utc::now();
        assert!(ensure_registration_open(STATUS_PUBLISHED, now, now + Duration::days(1), now).is_ok());
    }

    #[test]
    fn display_ongoing_while_running() {
        let now = Utc::now();
        let start = now - Duration::hours(1);
        let end = now + Duration::hours(1);
        assert_eq!(display_status(STATUS_PUBLISHED, start, end, now), DISPLAY_ONGOING);
    }

    #[test]
    fn display_published_before_start() {
        let now = Utc::now();
        let start = now + Duration::hours(1);
        let end = now + Duration::hours(2);
        assert_eq!(display_status(STATUS_PUBLISHED, start, end, now), STATUS_PUBLISHED);
    }

    #[test]
    fn display_never_overrides_non_published() {
        let now = Utc::now();
        let start = now - Duration::hours(1);
        let end = now + Duration::hours(1);
        assert_eq!(display_status(STATUS_CLOSED, start, end, now), STATUS_CLOSED);
        assert_eq!(display_status(STATUS_COMPLETED, start, end, now), STATUS_COMPLETED);
        assert_eq!(display_status(STATUS_DRAFT, start, end, now), STATUS_DRAFT);
    }
}
