//! Access privileges granted to the logged-on user.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Privilege domain covering pre-test (technician) data.
pub const PRETEST_PRIVILEGE: &str = "pretestPrivilege";

/// Privilege domain covering medical (doctor) data.
pub const MEDICAL_DATA_PRIVILEGE: &str = "medicalDataPrivilege";

/// Access level for one privilege domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Privilege {
    /// No access at all.
    #[default]
    #[serde(rename = "NOACCESS")]
    NoAccess,
    /// View only.
    #[serde(rename = "READONLY")]
    ReadOnly,
    /// View and edit.
    #[serde(rename = "FULLACCESS")]
    FullAccess,
}

impl Privilege {
    /// Decodes the one-letter code used in token payloads (`F`, `R`).
    /// Anything else means no access.
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        match code {
            "F" => Self::FullAccess,
            "R" => Self::ReadOnly,
            _ => Self::NoAccess,
        }
    }

    /// Returns true if data in this domain may be viewed.
    #[must_use]
    pub fn can_read(&self) -> bool {
        matches!(self, Self::ReadOnly | Self::FullAccess)
    }

    /// Returns true if data in this domain may be edited.
    #[must_use]
    pub fn can_write(&self) -> bool {
        matches!(self, Self::FullAccess)
    }
}

/// Privileges per domain. Domains that were never granted read as
/// [`Privilege::NoAccess`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Privileges(BTreeMap<String, Privilege>);

impl Privileges {
    /// Privileges with every well-known domain set to no access.
    #[must_use]
    pub fn none() -> Self {
        let mut domains = BTreeMap::new();
        domains.insert(PRETEST_PRIVILEGE.to_string(), Privilege::NoAccess);
        domains.insert(MEDICAL_DATA_PRIVILEGE.to_string(), Privilege::NoAccess);
        Self(domains)
    }

    /// Decodes the `prv` claim of a token payload.
    ///
    /// `pre` and `med` are the abbreviated names of the pre-test and medical
    /// data domains; other claim keys are taken as domain names verbatim.
    #[must_use]
    pub fn from_claims(claims: &BTreeMap<String, String>) -> Self {
        let mut privileges = Self::none();
        for (key, code) in claims {
            let domain = match key.as_str() {
                "pre" => PRETEST_PRIVILEGE,
                "med" => MEDICAL_DATA_PRIVILEGE,
                other => other,
            };
            privileges
                .0
                .insert(domain.to_string(), Privilege::from_code(code));
        }
        privileges
    }

    /// Access level for a domain.
    #[must_use]
    pub fn get(&self, domain: &str) -> Privilege {
        self.0.get(domain).copied().unwrap_or_default()
    }

    /// Access level for pre-test data.
    #[must_use]
    pub fn pretest(&self) -> Privilege {
        self.get(PRETEST_PRIVILEGE)
    }

    /// Access level for medical data.
    #[must_use]
    pub fn medical_data(&self) -> Privilege {
        self.get(MEDICAL_DATA_PRIVILEGE)
    }

    /// Iterates over all known domains.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Privilege)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl Default for Privileges {
    fn default() -> Self {
        Self::none()
    }
}
