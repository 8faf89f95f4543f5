use crate::error::SessionResult;
use crate::privilege::{Privilege, Privileges};
use crate::token::decode_token_payload;
use std::fmt;

/// The logged-on user's bearer token and the privileges it grants.
///
/// Built once per login and replaced wholesale on logout/login; never
/// mutated in place.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionContext {
    token: String,
    privileges: Privileges,
}

impl SessionContext {
    /// Decodes `token` and derives its privileges.
    ///
    /// A payload without a `prv` claim yields no access in every domain.
    ///
    /// # Errors
    ///
    /// Returns an error if the token payload cannot be decoded.
    pub fn from_token(token: impl Into<String>) -> SessionResult<Self> {
        let token = token.into();
        let payload = decode_token_payload(&token)?;
        let privileges = payload
            .prv
            .as_ref()
            .map(Privileges::from_claims)
            .unwrap_or_default();
        Ok(Self { token, privileges })
    }

    /// Builds a session with explicitly supplied privileges.
    #[must_use]
    pub fn with_privileges(token: impl Into<String>, privileges: Privileges) -> Self {
        Self {
            token: token.into(),
            privileges,
        }
    }

    /// The raw bearer token sent with every request.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// All decoded privileges.
    #[must_use]
    pub fn privileges(&self) -> &Privileges {
        &self.privileges
    }

    /// Access level for one domain.
    #[must_use]
    pub fn privilege(&self, domain: &str) -> Privilege {
        self.privileges.get(domain)
    }
}

// Keeps the bearer token out of logs.
impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("token", &"<redacted>")
            .field("privileges", &self.privileges)
            .finish()
    }
}
