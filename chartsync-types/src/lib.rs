//! Core type definitions for chartsync.
//!
//! Defines the composite entity identifier shared by the cache and the
//! sync client. An [`EntityId`] is either persisted (`"visit-4821"`) or
//! transient (`"visit"`), and its prefix selects both the REST resource
//! and the envelope field a response is unpacked from.

mod ids;

pub use ids::{capitalize, EntityId, RESPONSE_FIELD};
