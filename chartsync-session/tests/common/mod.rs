//! Shared test helpers for session tests.

#![allow(dead_code)]

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

/// Builds a token `header.payload.signature` around the given payload JSON.
pub fn make_token(payload_json: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(payload_json.as_bytes());
    format!("{header}.{payload}.c2lnbmF0dXJl")
}

/// Token granting full pre-test and read-only medical access.
pub fn technician_token() -> String {
    make_token(r#"{"sub":"user-12","prv":{"pre":"F","med":"R"}}"#)
}
