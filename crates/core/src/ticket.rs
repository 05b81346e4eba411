//! Ticket id generation and the QR payload codec.
//!
//! Ticket ids are human-decodable: a fixed prefix, the issue time in
//! base-36 millis, and a short random suffix. They are a uniqueness
//! target, not a security boundary; global uniqueness is enforced by a
//! unique constraint on the tickets table.
//!
//! The QR payload is a deterministic encoding binding the ticket to its
//! event, holder, and participation, signed with HMAC-SHA256 so it can
//! be verified by re-deriving and comparing.

use hmac::{Hmac, Mac};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

/// Prefix on every ticket id.
const TICKET_PREFIX: &str = "TKT";

/// Length of the random alphanumeric suffix.
const SUFFIX_LENGTH: usize = 6;

/// Version tag on the canonical QR payload form.
const QR_VERSION: &str = "v1";

type HmacSha256 = Hmac<Sha256>;

// ---------------------------------------------------------------------------
// Ticket id
// ---------------------------------------------------------------------------

/// Generate a ticket id for a ticket issued at `issued_at`.
///
/// Format: `TKT-<base36 unix millis>-<6 random alphanumerics>`.
pub fn generate_ticket_id(issued_at: Timestamp) -> String {
    let suffix: String = rand::rng()
        .sample_iter(&rand::distr::Alphanumeric)
        .take(SUFFIX_LENGTH)
        .map(char::from)
        .collect();

    format!(
        "{TICKET_PREFIX}-{}-{}",
        to_base36(issued_at.timestamp_millis().max(0) as u64),
        suffix.to_uppercase()
    )
}

fn to_base36(mut value: u64) -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(ALPHABET[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).expect("base36 alphabet is ASCII")
}

// ---------------------------------------------------------------------------
// QR payload
// ---------------------------------------------------------------------------

/// The identity a QR payload binds together.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TicketClaims {
    pub ticket_id: String,
    pub event_id: DbId,
    pub user_id: DbId,
    pub participation_id: DbId,
    /// Issue time as a UTC Unix timestamp (seconds).
    pub issued_at: i64,
}

impl TicketClaims {
    /// The canonical form the signature covers.
    fn canonical(&self) -> String {
        format!(
            "{QR_VERSION}|{}|{}|{}|{}|{}",
            self.ticket_id, self.event_id, self.user_id, self.participation_id, self.issued_at
        )
    }
}

/// Encode a QR payload: hex of the canonical form, a dot, and the
/// HMAC-SHA256 signature over the canonical form.
pub fn encode_qr_payload(claims: &TicketClaims, secret: &str) -> String {
    let canonical = claims.canonical();
    format!("{}.{}", hex::encode(canonical.as_bytes()), sign(&canonical, secret))
}

/// Decode and verify a QR payload, returning the claims it binds.
pub fn decode_qr_payload(payload: &str, secret: &str) -> Result<TicketClaims, CoreError> {
    let (encoded, signature) = payload
        .split_once('.')
        .ok_or_else(|| CoreError::Validation("Malformed QR payload".to_string()))?;

    let canonical_bytes = hex::decode(encoded)
        .ok_or_else(|| CoreError::Validation("Malformed QR payload".to_string()))?;
    let canonical = String::from_utf8(canonical_bytes)
        .map_err(|_| CoreError::Validation("Malformed QR payload".to_string()))?;

    if sign(&canonical, secret) != signature {
        return Err(CoreError::Validation(
            "QR payload signature mismatch".to_string(),
        ));
    }

    let mut parts = canonical.split('|');
    let version = parts.next();
    if version != Some(QR_VERSION) {
        return Err(CoreError::Validation(
            "Unsupported QR payload version".to_string(),
        ));
    }

    let ticket_id = parts
        .next()
        .ok_or_else(|| CoreError::Validation("Malformed QR payload".to_string()))?
        .to_string();
    let mut next_id = || -> Result<i64, CoreError> {
        parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(|| CoreError::Validation("Malformed QR payload".to_string()))
    };
    Ok(TicketClaims {
        ticket_id,
        event_id: next_id()?,
        user_id: next_id()?,
        participation_id: next_id()?,
        issued_at: next_id()?,
    })
}

/// Verify a stored payload against the ticket's recorded identity by
/// re-deriving the encoding and comparing.
pub fn verify_qr_payload(claims: &TicketClaims, payload: &str, secret: &str) -> bool {
    encode_qr_payload(claims, secret) == payload
}

fn sign(canonical: &str, secret: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(canonical.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

// ---------------------------------------------------------------------------
// hex encoding helpers (no extra dep)
// ---------------------------------------------------------------------------

mod hex {
    /// Encode bytes as a lowercase hex string.
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Decode a lowercase/uppercase hex string; `None` on invalid input.
    pub fn decode(input: &str) -> Option<Vec<u8>> {
        if input.len() % 2 != 0 {
            return None;
        }
        (0..input.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(input.get(i..i + 2)?, 16).ok())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Utc;

    fn claims() -> TicketClaims {
        TicketClaims {
            ticket_id: "TKT-abc123-X9QK2F".to_string(),
            event_id: 42,
            user_id: 7,
            participation_id: 1001,
            issued_at: 1_756_000_000,
        }
    }

    #[test]
    fn ticket_id_has_expected_shape() {
        let id = generate_ticket_id(Utc::now());
        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "TKT");
        assert!(parts[1].chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        assert_eq!(parts[2].len(), SUFFIX_LENGTH);
    }

    #[test]
    fn ticket_ids_differ_for_same_instant() {
        let now = Utc::now();
        let a = generate_ticket_id(now);
        let b = generate_ticket_id(now);
        assert_ne!(a, b);
    }

    #[test]
    fn base36_round_values() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
    }

    #[test]
    fn qr_payload_round_trips() {
        let claims = claims();
        let payload = encode_qr_payload(&claims, "secret");
        let decoded = decode_qr_payload(&payload, "secret").unwrap();
        assert_eq!(decoded, claims);
        assert!(verify_qr_payload(&claims, &payload, "secret"));
    }

    #[test]
    fn qr_payload_is_deterministic() {
        let claims = claims();
        assert_eq!(
            encode_qr_payload(&claims, "secret"),
            encode_qr_payload(&claims, "secret")
        );
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let payload = encode_qr_payload(&claims(), "secret");
        let mut tampered = payload.clone();
        // Flip a character inside the hex-encoded body.
        tampered.replace_range(0..1, if payload.starts_with('0') { "1" } else { "0" });
        assert_matches!(
            decode_qr_payload(&tampered, "secret"),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let claims = claims();
        let payload = encode_qr_payload(&claims, "secret");
        assert_matches!(
            decode_qr_payload(&payload, "other"),
            Err(CoreError::Validation(_))
        );
        assert!(!verify_qr_payload(&claims, &payload, "other"));
    }

    #[test]
    fn mismatched_claims_fail_verification() {
        let claims = claims();
        let payload = encode_qr_payload(&claims, "secret");
        let mut other = claims.clone();
        other.user_id += 1;
        assert!(!verify_qr_payload(&other, &payload, "secret"));
    }
}
