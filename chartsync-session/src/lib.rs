//! Session handling for chartsync.
//!
//! This crate handles:
//! - Decoding the payload of the bearer token issued at login
//! - Deriving per-domain access privileges from the token's `prv` claim
//! - Holding both as an immutable [`SessionContext`] that the sync client
//!   reads on every request
//!
//! # Privilege Codes
//!
//! | Claim value | Privilege      |
//! |-------------|----------------|
//! | `F`         | `FULLACCESS`   |
//! | `R`         | `READONLY`     |
//! | other       | `NOACCESS`     |

mod context;
mod error;
mod privilege;
mod token;

pub use context::SessionContext;
pub use error::{SessionError, SessionResult};
pub use privilege::{Privilege, Privileges, MEDICAL_DATA_PRIVILEGE, PRETEST_PRIVILEGE};
pub use token::{decode_token_payload, TokenPayload};
