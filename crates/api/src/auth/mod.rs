//! Authentication primitives.
//!
//! Identity and session issuance live with the external auth service;
//! this module only validates the HS256 tokens it mints and exposes the
//! embedded `{userId, role}` principal.

pub mod jwt;
