use chartsync_types::EntityId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::trace;

/// A cached entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The entity's identifier.
    pub id: EntityId,
    /// Server version of the payload; `None` means always stale.
    pub version: Option<i64>,
    /// The entity as last returned by the server.
    pub payload: Value,
}

impl CacheEntry {
    fn new(id: EntityId, payload: Value) -> Self {
        let version = payload_version(&payload);
        Self {
            id,
            version,
            payload,
        }
    }
}

/// Cache key for the field definitions of `id`'s type in `language`,
/// e.g. `VisitDefinition-en`.
#[must_use]
pub fn definition_key(id: &EntityId, language: &str) -> String {
    format!("{}Definition-{}", id.type_name(), language)
}

fn payload_version(payload: &Value) -> Option<i64> {
    payload.get("version").and_then(Value::as_i64)
}

fn payload_id(payload: &Value) -> Option<EntityId> {
    payload
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(EntityId::from)
}

/// Identity map of server entities, index lists and field definitions.
///
/// All methods take `&self`; the maps are lock-guarded so the cache can be
/// shared between concurrent in-flight requests. No multi-key atomicity is
/// provided.
#[derive(Debug, Default)]
pub struct EntityCache {
    entries: RwLock<HashMap<EntityId, CacheEntry>>,
    lists: RwLock<HashMap<String, Vec<EntityId>>>,
    definitions: RwLock<HashMap<String, Value>>,
}

// Poisoned locks are recovered.
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

impl EntityCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ── Entities ─────────────────────────────────────────────────

    /// Stores `payload` under `id`.
    ///
    /// A write is ignored (and `false` returned) when the cached entry is
    /// versioned and the incoming payload is unversioned or older, so a late
    /// response can never roll an entity back.
    pub fn put(&self, id: &EntityId, payload: Value) -> bool {
        if id.is_empty() {
            return false;
        }
        let mut entries = write(&self.entries);
        if let Some(cached_version) = entries.get(id).and_then(|e| e.version) {
            match payload_version(&payload) {
                Some(version) if version >= cached_version => {}
                incoming => {
                    trace!(
                        "Ignoring stale write for {}: cached version {}, incoming {:?}",
                        id, cached_version, incoming
                    );
                    return false;
                }
            }
        }
        entries.insert(id.clone(), CacheEntry::new(id.clone(), payload));
        true
    }

    /// Stores `payload` under its own `id` field. Payloads without an id
    /// are skipped.
    pub fn put_by_id(&self, payload: Value) -> bool {
        match payload_id(&payload) {
            Some(id) => self.put(&id, payload),
            None => false,
        }
    }

    /// Stores every payload under its own `id` field.
    pub fn put_all<I>(&self, payloads: I)
    where
        I: IntoIterator<Item = Value>,
    {
        for payload in payloads {
            self.put_by_id(payload);
        }
    }

    /// Returns the cached payload for `id`.
    #[must_use]
    pub fn get(&self, id: &EntityId) -> Option<Value> {
        read(&self.entries).get(id).map(|e| e.payload.clone())
    }

    /// Returns the full cache entry for `id`.
    #[must_use]
    pub fn entry(&self, id: &EntityId) -> Option<CacheEntry> {
        read(&self.entries).get(id).cloned()
    }

    /// Returns the payloads for `ids` in order. Ids that are not cached
    /// leave a `None` hole; the output always has the input's length.
    #[must_use]
    pub fn get_many(&self, ids: &[EntityId]) -> Vec<Option<Value>> {
        let entries = read(&self.entries);
        ids.iter()
            .map(|id| entries.get(id).map(|e| e.payload.clone()))
            .collect()
    }

    /// Version of the cached entry, or `-1` if absent or unversioned.
    #[must_use]
    pub fn get_version(&self, id: &EntityId) -> i64 {
        read(&self.entries)
            .get(id)
            .and_then(|e| e.version)
            .unwrap_or(-1)
    }

    /// Returns true if `id` is cached.
    #[must_use]
    pub fn contains(&self, id: &EntityId) -> bool {
        read(&self.entries).contains_key(id)
    }

    /// Evicts `id`, returning the evicted entry.
    pub fn remove(&self, id: &EntityId) -> Option<CacheEntry> {
        write(&self.entries).remove(id)
    }

    /// Number of cached entities.
    #[must_use]
    pub fn len(&self) -> usize {
        read(&self.entries).len()
    }

    /// Returns true if no entity is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        read(&self.entries).is_empty()
    }

    // ── Index lists ──────────────────────────────────────────────

    /// Replaces the list stored under `key`.
    pub fn put_list(&self, key: &str, ids: Vec<EntityId>) {
        write(&self.lists).insert(key.to_string(), ids);
    }

    /// Returns the list stored under `key`.
    #[must_use]
    pub fn get_list(&self, key: &str) -> Option<Vec<EntityId>> {
        read(&self.lists).get(key).cloned()
    }

    /// Resolves the list under `key` through [`EntityCache::get_many`].
    #[must_use]
    pub fn get_list_items(&self, key: &str) -> Option<Vec<Option<Value>>> {
        let ids = self.get_list(key)?;
        Some(self.get_many(&ids))
    }

    /// Inserts `id` at the front of the list under `key`, creating the list
    /// if needed.
    pub fn prepend_to_list(&self, key: &str, id: EntityId) {
        write(&self.lists)
            .entry(key.to_string())
            .or_default()
            .insert(0, id);
    }

    /// Removes every occurrence of `id` from the list under `key`.
    /// Returns true if anything was removed.
    pub fn remove_from_list(&self, key: &str, id: &EntityId) -> bool {
        let mut lists = write(&self.lists);
        match lists.get_mut(key) {
            Some(ids) => {
                let before = ids.len();
                ids.retain(|existing| existing != id);
                ids.len() != before
            }
            None => false,
        }
    }

    /// Removes `id` from every list.
    pub fn remove_from_all_lists(&self, id: &EntityId) {
        for ids in write(&self.lists).values_mut() {
            ids.retain(|existing| existing != id);
        }
    }

    // ── Field definitions ────────────────────────────────────────

    /// Stores a field definition under a key built by [`definition_key`].
    pub fn put_definition(&self, key: &str, definition: Value) {
        write(&self.definitions).insert(key.to_string(), definition);
    }

    /// Returns the field definition stored under `key`.
    #[must_use]
    pub fn get_definition(&self, key: &str) -> Option<Value> {
        read(&self.definitions).get(key).cloned()
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Drops every entity, list and definition.
    pub fn clear_all(&self) {
        write(&self.entries).clear();
        write(&self.lists).clear();
        write(&self.definitions).clear();
    }
}
