//! REST sync layer for chartsync.
//!
//! Keeps the session-scoped [`EntityCache`] consistent with the server:
//!
//! - **Fetch**: conditional GET carrying the cached version; the server
//!   answers `upToDate` when nothing changed
//! - **Store**: POST for transient ids, PUT for persisted ones; the response
//!   may assign the entity its persisted id
//! - **Delete**, **Search** and generic server-side **Actions**
//!
//! # Error Taxonomy
//!
//! Every operation returns a [`SyncOutcome`]:
//!
//! 1. **System errors**: non-2xx status, transport failure or a malformed
//!    envelope. The cache is not touched.
//! 2. **Business errors**: an `errors` array in a 2xx body. The cache is not
//!    evicted.
//! 3. **Validation errors**: a rejected submit. A persisted entity is
//!    evicted and refetched in the background so the rejected edit never
//!    lingers as if it were saved.
//!
//! # Concurrency
//!
//! Calls are independent. Two concurrent stores of the same entity are not
//! serialized; the last response to arrive wins the cache write, unless it
//! carries an older version than the one already cached.
//!
//! Responses to requests started before an account switch or logout are
//! returned to the caller but never written to the cache.
//!
//! # Example
//!
//! ```no_run
//! use chartsync_sync::{ClientConfig, SyncClient, SyncOutcome};
//! use chartsync_types::EntityId;
//!
//! # async fn run() -> chartsync_sync::SyncResult<()> {
//! let client = SyncClient::new(ClientConfig::for_host("emr.example.org"))?;
//! let id = EntityId::from("patient-77");
//! match client.fetch_by_id(&id, false).await {
//!     SyncOutcome::Success(Some(patient)) => println!("{patient}"),
//!     SyncOutcome::UpToDate => println!("{:?}", client.cache().get(&id)),
//!     other => eprintln!("{:?}", other.messages()),
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
pub mod envelope;
mod error;
mod outcome;

pub use chartsync_cache::EntityCache;
pub use client::{append_parameters, SyncClient, VALIDATION_ERROR_MESSAGE};
pub use config::{
    extract_hostname, host_from_account, ClientConfig, DEFAULT_HOST, EMR_HOST_FIELD, REST_VERSION,
};
pub use error::{SyncError, SyncResult};
pub use outcome::SyncOutcome;
pub use reqwest::Method;
