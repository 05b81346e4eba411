//! Eligibility constraint normalization and matching.
//!
//! Events carry a free-form eligibility string entered by organizers.
//! It is normalized to a small closed set at evaluation time; anything
//! unrecognized is treated permissively so a typo never locks everyone
//! out of an event.

use crate::error::CoreError;

/// A normalized eligibility constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    /// No restriction.
    All,
    /// Restricted to participants with the `iiit` category.
    Iiit,
    /// Restricted to participants with the `non-iiit` category.
    NonIiit,
    /// Constraint string not recognized; treated as no restriction.
    Unrecognized,
}

/// Normalize a raw constraint string: trim, lowercase, and collapse runs
/// of whitespace, underscores, and hyphens into a single hyphen.
pub fn normalize(raw: &str) -> Eligibility {
    let mut collapsed = String::with_capacity(raw.len());
    let mut in_separator = false;
    for ch in raw.trim().chars() {
        if ch.is_whitespace() || ch == '_' || ch == '-' {
            if !in_separator && !collapsed.is_empty() {
                collapsed.push('-');
            }
            in_separator = true;
        } else {
            collapsed.extend(ch.to_lowercase());
            in_separator = false;
        }
    }
    // A trailing separator run leaves a dangling hyphen.
    while collapsed.ends_with('-') {
        collapsed.pop();
    }

    match collapsed.as_str() {
        "" | "all" => Eligibility::All,
        "iiit" => Eligibility::Iiit,
        "non-iiit" => Eligibility::NonIiit,
        _ => Eligibility::Unrecognized,
    }
}

/// Whether a participant with `category` satisfies the constraint.
pub fn is_eligible(constraint: Eligibility, category: &str) -> bool {
    match constraint {
        Eligibility::All | Eligibility::Unrecognized => true,
        Eligibility::Iiit => category == "iiit",
        Eligibility::NonIiit => category == "non-iiit",
    }
}

/// Evaluate a raw constraint against a participant category, failing with
/// `Forbidden` on a negative match.
pub fn ensure_eligible(raw_constraint: &str, category: &str) -> Result<(), CoreError> {
    let constraint = normalize(raw_constraint);
    if is_eligible(constraint, category) {
        Ok(())
    } else {
        Err(CoreError::Forbidden(format!(
            "This event is restricted to {raw_constraint} participants"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn normalizes_common_spellings() {
        assert_eq!(normalize("all"), Eligibility::All);
        assert_eq!(normalize("  ALL "), Eligibility::All);
        assert_eq!(normalize(""), Eligibility::All);
        assert_eq!(normalize("iiit"), Eligibility::Iiit);
        assert_eq!(normalize(" IIIT "), Eligibility::Iiit);
        assert_eq!(normalize("non-iiit"), Eligibility::NonIiit);
        assert_eq!(normalize("Non IIIT"), Eligibility::NonIiit);
        assert_eq!(normalize("NON__IIIT"), Eligibility::NonIiit);
        assert_eq!(normalize("non - iiit"), Eligibility::NonIiit);
    }

    #[test]
    fn unrecognized_is_permissive() {
        assert_eq!(normalize("students only"), Eligibility::Unrecognized);
        assert!(is_eligible(Eligibility::Unrecognized, "iiit"));
        assert!(is_eligible(Eligibility::Unrecognized, "anything"));
    }

    #[test]
    fn trailing_separators_do_not_leak() {
        assert_eq!(normalize("iiit--"), Eligibility::Iiit);
        assert_eq!(normalize("-all-"), Eligibility::All);
    }

    #[test]
    fn exact_category_match_required() {
        assert!(is_eligible(Eligibility::Iiit, "iiit"));
        assert!(!is_eligible(Eligibility::Iiit, "non-iiit"));
        assert!(!is_eligible(Eligibility::Iiit, "IIIT"));
        assert!(is_eligible(Eligibility::NonIiit, "non-iiit"));
        assert!(!is_eligible(Eligibility::NonIiit, "iiit"));
    }

    #[test]
    fn ensure_eligible_forbids_on_mismatch() {
        assert!(ensure_eligible("iiit", "iiit").is_ok());
        let err = ensure_eligible("iiit", "non-iiit").unwrap_err();
        assert_matches!(err, CoreError::Forbidden(_));
    }

    #[test]
    fn ensure_eligible_allows_all_and_unrecognized() {
        assert!(ensure_eligible("all", "non-iiit").is_ok());
        assert!(ensure_eligible("faculty only", "non-iiit").is_ok());
    }
}
