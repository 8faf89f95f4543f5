//! Response envelope unpacking.
//!
//! The server wraps entities in a JSON envelope. Either the envelope is the
//! entity itself (`{"id": "patient-77", ...}`) or the entity sits under its
//! envelope key next to related collections and status flags:
//!
//! ```text
//! {
//!   "visit": {...},
//!   "userList": [...],          // any field ending in "List"
//!   "errors": [...],            // business/validation messages
//!   "hasValidationError": true,
//!   "upToDate": true
//! }
//! ```
//!
//! Side collections are absorbed into the cache so one response can hydrate
//! many unrelated entities.

use crate::error::{SyncError, SyncResult};
use chartsync_cache::EntityCache;
use chartsync_types::EntityId;
use serde_json::Value;
use std::collections::BTreeMap;

/// Envelope field carrying error messages.
pub const ERRORS_FIELD: &str = "errors";

/// Suffix marking an envelope field as a collection of entities.
pub const LIST_SUFFIX: &str = "List";

/// Returns the primary entity of `envelope` for `id`.
///
/// # Errors
///
/// Returns [`SyncError::MissingEntity`] if the envelope is neither the
/// entity itself nor carries it under `id`'s envelope key.
pub fn extract_primary(envelope: &Value, id: &EntityId) -> SyncResult<Value> {
    if envelope.get("id").and_then(Value::as_str) == Some(id.as_str()) {
        return Ok(envelope.clone());
    }
    match envelope.get(id.envelope_key()) {
        Some(item) if !item.is_null() => Ok(item.clone()),
        _ => Err(SyncError::MissingEntity {
            field: id.envelope_key().to_string(),
            id: id.to_string(),
        }),
    }
}

/// Caches every entity found at the top level of `envelope`, except the
/// `errors` field. Arrays are cached element by element.
pub fn absorb_side_entities(cache: &EntityCache, envelope: &Value) {
    let Some(fields) = envelope.as_object() else {
        return;
    };
    for (name, field) in fields {
        if name == ERRORS_FIELD {
            continue;
        }
        match field {
            Value::Array(items) => cache.put_all(items.iter().cloned()),
            other => {
                cache.put_by_id(other.clone());
            }
        }
    }
}

/// Caches the elements of every field whose name ends in `List`.
pub fn absorb_lists(cache: &EntityCache, envelope: &Value) {
    let Some(fields) = envelope.as_object() else {
        return;
    };
    for (name, field) in fields {
        if !name.ends_with(LIST_SUFFIX) {
            continue;
        }
        if let Value::Array(items) = field {
            cache.put_all(items.iter().cloned());
        }
    }
}

/// Ids of the entities in `envelope[field]`, in order.
pub fn list_ids(envelope: &Value, field: &str) -> Vec<EntityId> {
    envelope
        .get(field)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("id").and_then(Value::as_str))
                .map(EntityId::from)
                .collect()
        })
        .unwrap_or_default()
}

/// True if the server confirmed the cached version is current.
pub fn is_up_to_date(envelope: &Value) -> bool {
    envelope.get("upToDate").and_then(Value::as_bool) == Some(true)
}

/// True if the server flagged the submitted item as invalid.
pub fn has_validation_error(envelope: &Value) -> bool {
    envelope.get("hasValidationError").and_then(Value::as_bool) == Some(true)
}

/// Messages of the envelope's `errors` field, or `None` when the field is
/// absent, null, false, an empty string or zero. An empty array still counts
/// as an error report.
pub fn error_messages(envelope: &Value) -> Option<Vec<String>> {
    match envelope.get(ERRORS_FIELD) {
        None | Some(Value::Null) | Some(Value::Bool(false)) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(Value::Number(n)) if n.as_f64() == Some(0.0) => None,
        Some(errors) => Some(error_messages_of(errors)),
    }
}

/// Renders an `errors` value as display strings.
pub fn error_messages_of(errors: &Value) -> Vec<String> {
    match errors {
        Value::Array(items) => items.iter().map(message_of).collect(),
        Value::Null => Vec::new(),
        other => vec![message_of(other)],
    }
}

fn message_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn is_error_key(key: &str) -> bool {
    key.ends_with("rror") || key.ends_with("rrors")
}

/// Removes every error annotation (`*Error`, `*Errors`, `errors`) from
/// `item`, recursively, so stale messages are not sent back to the server.
pub fn clear_errors(item: &mut Value) {
    match item {
        Value::Object(fields) => {
            fields.retain(|key, _| !is_error_key(key));
            for field in fields.values_mut() {
                clear_errors(field);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(clear_errors),
        _ => {}
    }
}

/// Per-field messages in `entity`, keyed by dotted path
/// (e.g. `refraction.sphereError`). The top-level `errors` list is not a
/// field error and is skipped.
pub fn field_errors(entity: &Value) -> BTreeMap<String, String> {
    let mut found = BTreeMap::new();
    collect_field_errors(entity, "", &mut found);
    found.remove(ERRORS_FIELD);
    found
}

fn collect_field_errors(value: &Value, prefix: &str, found: &mut BTreeMap<String, String>) {
    let path = |key: &str| {
        if prefix.is_empty() {
            key.to_string()
        } else {
            format!("{prefix}.{key}")
        }
    };
    match value {
        Value::Object(fields) => {
            for (key, field) in fields {
                if is_error_key(key) {
                    if !field.is_null() {
                        found.insert(path(key), message_of(field));
                    }
                } else {
                    collect_field_errors(field, &path(key), found);
                }
            }
        }
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                collect_field_errors(item, &path(&index.to_string()), found);
            }
        }
        _ => {}
    }
}

/// Copies every error annotation of `source` onto the same path in `target`.
/// Paths that do not exist in `target` are skipped.
pub fn overlay_errors(target: &mut Value, source: &Value) {
    match (target, source) {
        (Value::Object(target_fields), Value::Object(source_fields)) => {
            for (key, field) in source_fields {
                if is_error_key(key) {
                    target_fields.insert(key.clone(), field.clone());
                } else if let Some(target_field) = target_fields.get_mut(key) {
                    overlay_errors(target_field, field);
                }
            }
        }
        (Value::Array(target_items), Value::Array(source_items)) => {
            for (target_item, source_item) in target_items.iter_mut().zip(source_items) {
                overlay_errors(target_item, source_item);
            }
        }
        _ => {}
    }
}

/// Compact copy of a response for debug logging: the primary entity is
/// unwrapped when the response is clean, and bulky `definition`/`data`
/// fields are replaced by placeholders.
pub fn redact_for_log(envelope: &Value, id: &EntityId) -> Value {
    let mut cleaned = envelope;
    if !has_validation_error(envelope) && error_messages(envelope).is_none() {
        if let Some(item) = envelope.get(id.envelope_key()) {
            cleaned = item;
        }
    }
    let mut cleaned = cleaned.clone();
    if let Some(fields) = cleaned.as_object_mut() {
        if fields.contains_key("definition") {
            fields.insert("definition".to_string(), Value::from("{...}"));
        }
        if fields.contains_key("data") {
            fields.insert("data".to_string(), Value::from("..."));
        }
    }
    cleaned
}
