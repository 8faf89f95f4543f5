//! Composite entity identifiers.
//!
//! Every server-authored entity is addressed by a dash-delimited string:
//! `"visit-4821"` for an entity the server has persisted, or the bare
//! lowercase type name (`"visit"`, `"customExam"`) for one that has not
//! been created yet. The prefix doubles as the REST resource name and as
//! the JSON field name the server wraps the entity in, so the derivations
//! below must match the server's conventions exactly.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Field name the server uses when an envelope carries no typed entity.
pub const RESPONSE_FIELD: &str = "response";

/// Identifier of a server-owned entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Wraps an existing identifier string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identifier for an entity of `type_prefix` that the server has not created yet.
    #[must_use]
    pub fn transient(type_prefix: &str) -> Self {
        Self(type_prefix.to_string())
    }

    /// Identifier for the persisted entity `n` of `type_prefix`.
    #[must_use]
    pub fn persisted(type_prefix: &str, n: i64) -> Self {
        Self(format!("{type_prefix}-{n}"))
    }

    /// Returns the raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the empty identifier.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Lowercase type prefix: everything before the first dash.
    #[must_use]
    pub fn prefix(&self) -> &str {
        match self.0.find('-') {
            Some(dash) => &self.0[..dash],
            None => &self.0,
        }
    }

    /// Capitalized REST resource name, e.g. `Visit` for `visit-4821`.
    #[must_use]
    pub fn type_name(&self) -> String {
        capitalize(self.prefix())
    }

    /// JSON field name the server wraps this entity in, e.g. `visit`.
    #[must_use]
    pub fn envelope_key(&self) -> &str {
        if self.0.is_empty() {
            RESPONSE_FIELD
        } else {
            self.prefix()
        }
    }

    /// Numeric server id, or `-1` when there is none.
    #[must_use]
    pub fn numeric_id(&self) -> i64 {
        if self.0.is_empty() {
            return -1;
        }
        if let Ok(n) = self.0.parse::<i64>() {
            return n;
        }
        let rest = match self.0.find('-') {
            Some(dash) => &self.0[dash + 1..],
            None => self.0.as_str(),
        };
        leading_integer(rest).unwrap_or(-1)
    }

    /// True once the server has assigned a numeric id.
    #[must_use]
    pub fn is_persisted(&self) -> bool {
        self.0.find('-').is_some_and(|dash| dash > 0)
    }
}

/// Uppercases the first character, leaving the rest untouched.
#[must_use]
pub fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// Optional sign, then as many digits as are present.
fn leading_integer(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (sign, digits) = match s.as_bytes().first() {
        Some(b'-') => (-1, &s[1..]),
        Some(b'+') => (1, &s[1..]),
        _ => (1, s),
    };
    let end = digits
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for EntityId {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for EntityId {
    fn borrow(&self) -> &str {
        &self.0
    }
}
