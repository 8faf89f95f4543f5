//! Session token decoding.
//!
//! Tokens use the format: `header.payload.signature`
//!
//! Only the payload is inspected on the client. It is a base64 JSON object
//! whose optional `prv` claim carries the user's privileges as one-letter
//! codes, e.g. `{"prv": {"pre": "F", "med": "R"}}`. The signature is checked
//! by the server on every request and is ignored here.

use crate::error::{SessionError, SessionResult};
use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The decoded token payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenPayload {
    /// Privilege claims, keyed by abbreviated domain name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prv: Option<BTreeMap<String, String>>,
    /// Every other claim, kept as-is.
    #[serde(flatten)]
    pub claims: serde_json::Map<String, serde_json::Value>,
}

/// Decodes the payload segment of a session token.
///
/// Accepts both the standard and the URL-safe base64 alphabet, with or
/// without padding.
///
/// # Errors
///
/// Returns an error if the token has no payload segment, or the segment is
/// not base64-encoded JSON.
pub fn decode_token_payload(token: &str) -> SessionResult<TokenPayload> {
    let token = token.trim();
    let mut parts = token.split('.');
    let payload_b64 = match (parts.next(), parts.next()) {
        (Some(_), Some(payload)) if !payload.is_empty() => payload,
        _ => {
            return Err(SessionError::InvalidToken(
                "token must have a payload segment after the first dot".to_string(),
            ));
        }
    };

    let normalized: String = payload_b64
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();
    let payload_json = STANDARD_NO_PAD.decode(normalized.as_bytes())?;
    Ok(serde_json::from_slice(&payload_json)?)
}
