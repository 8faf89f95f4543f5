//! Tagged result of every sync client operation.

use crate::error::SyncError;
use serde_json::Value;
use std::collections::BTreeMap;

/// What a sync operation produced.
///
/// The three failure kinds are never conflated: a system error is a
/// transport or protocol failure, a business error is a server-side rule
/// violation, and a validation error is a per-field rejection of a
/// submitted item.
#[derive(Debug)]
pub enum SyncOutcome {
    /// The entity was fetched or accepted; the cache has been updated.
    /// `None` for no-op calls (empty id, delete of a transient item).
    Success(Option<Value>),

    /// The cached copy is current; read it back from the cache.
    UpToDate,

    /// The server rejected the submitted item. `item` is a copy of it with
    /// an `errors` array, the per-field messages and its definition attached.
    ValidationError {
        item: Value,
        field_errors: BTreeMap<String, String>,
    },

    /// The server refused the operation for a domain reason.
    BusinessError { messages: Vec<String> },

    /// Transport or protocol failure. For stores, `item` is a copy of the
    /// submitted item with the formatted error attached.
    SystemError {
        cause: SyncError,
        item: Option<Value>,
    },
}

impl SyncOutcome {
    pub(crate) fn system(cause: impl Into<SyncError>) -> Self {
        SyncOutcome::SystemError {
            cause: cause.into(),
            item: None,
        }
    }

    /// Returns true for [`SyncOutcome::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, SyncOutcome::Success(_))
    }

    /// Returns true for [`SyncOutcome::UpToDate`].
    pub fn is_up_to_date(&self) -> bool {
        matches!(self, SyncOutcome::UpToDate)
    }

    /// Returns true for any of the three error kinds.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            SyncOutcome::ValidationError { .. }
                | SyncOutcome::BusinessError { .. }
                | SyncOutcome::SystemError { .. }
        )
    }

    /// The item carried by this outcome, if any.
    pub fn item(&self) -> Option<&Value> {
        match self {
            SyncOutcome::Success(item) => item.as_ref(),
            SyncOutcome::ValidationError { item, .. } => Some(item),
            SyncOutcome::SystemError { item, .. } => item.as_ref(),
            SyncOutcome::UpToDate | SyncOutcome::BusinessError { .. } => None,
        }
    }

    /// Consumes the outcome, returning its item.
    pub fn into_item(self) -> Option<Value> {
        match self {
            SyncOutcome::Success(item) => item,
            SyncOutcome::ValidationError { item, .. } => Some(item),
            SyncOutcome::SystemError { item, .. } => item,
            SyncOutcome::UpToDate | SyncOutcome::BusinessError { .. } => None,
        }
    }

    /// User-facing messages for error outcomes; empty otherwise.
    pub fn messages(&self) -> Vec<String> {
        match self {
            SyncOutcome::BusinessError { messages } => messages.clone(),
            SyncOutcome::ValidationError { item, .. } => item
                .get("errors")
                .map(crate::envelope::error_messages_of)
                .unwrap_or_default(),
            SyncOutcome::SystemError { cause, .. } => vec![cause.to_string()],
            SyncOutcome::Success(_) | SyncOutcome::UpToDate => Vec::new(),
        }
    }
}
