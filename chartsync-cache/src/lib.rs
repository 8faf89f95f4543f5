//! In-memory entity cache for chartsync.
//!
//! A session-scoped identity map from [`EntityId`] to the last payload the
//! server returned for it, plus named index lists describing derived
//! relationships (e.g. a patient's visits, newest first).
//!
//! # Architecture
//!
//! - Entries live for the whole session; nothing expires by time or size
//! - An entry's version comes from the payload's `version` field and is what
//!   the sync client sends for conditional fetches
//! - Index lists are stored under synthetic keys such as
//!   `"visitHistory-patient-77"` and hold ids, never payloads
//! - Field definitions (form schemas) are cached per type and language
//! - Everything is cleared wholesale on account switch

mod entity_cache;

pub use entity_cache::{definition_key, CacheEntry, EntityCache};
