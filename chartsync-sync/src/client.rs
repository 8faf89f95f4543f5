//! REST client for server-authored entities.
//!
//! Every operation is a single request/response: no retries, no polling.
//! Responses are unpacked into the shared [`EntityCache`] before the
//! outcome is returned, so callers can always re-read the cache afterwards.

use crate::config::ClientConfig;
use crate::envelope::{
    absorb_lists, absorb_side_entities, clear_errors, error_messages, extract_primary,
    field_errors, has_validation_error, is_up_to_date, list_ids, overlay_errors, redact_for_log,
};
use crate::error::{SyncError, SyncResult};
use crate::outcome::SyncOutcome;
use chartsync_cache::{definition_key, EntityCache};
use chartsync_session::SessionContext;
use chartsync_types::EntityId;
use reqwest::{Client, Method};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Message attached when the server flags a validation error without
/// explaining it.
pub const VALIDATION_ERROR_MESSAGE: &str =
    "Some fields have invalid values. Please correct the highlighted fields.";

/// Client-only form schema that must never be sent to the server.
const DEFINITION_FIELD: &str = "definition";

/// Appends `criteria` to `url` as a query string.
///
/// Keys and values are percent-encoded; null values are omitted entirely.
/// Strings are sent as-is, other values in their JSON rendering.
pub fn append_parameters(url: &str, criteria: &Value) -> String {
    let Some(fields) = criteria.as_object() else {
        return url.to_string();
    };
    let mut url = url.to_string();
    let mut separator = '?';
    for (key, value) in fields {
        let value = match value {
            Value::Null => continue,
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        url.push(separator);
        url.push_str(&urlencoding::encode(key));
        url.push('=');
        url.push_str(&urlencoding::encode(&value));
        separator = '&';
    }
    url
}

fn item_id(item: &Value) -> Option<EntityId> {
    item.get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(EntityId::from)
}

/// The sync client. Cheap to clone; clones share the cache, the session
/// and the request counter.
#[derive(Clone)]
pub struct SyncClient {
    config: Arc<ClientConfig>,
    base_url: Arc<str>,
    client: Client,
    cache: Arc<EntityCache>,
    session: Arc<RwLock<Option<SessionContext>>>,
    session_epoch: Arc<AtomicU64>,
    request_counter: Arc<AtomicU64>,
}

impl SyncClient {
    /// Creates a client with a fresh cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is empty or the HTTP client cannot
    /// be built.
    pub fn new(config: ClientConfig) -> SyncResult<Self> {
        Self::with_cache(config, Arc::new(EntityCache::new()))
    }

    /// Creates a client that populates an existing cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is empty or the HTTP client cannot
    /// be built.
    pub fn with_cache(config: ClientConfig, cache: Arc<EntityCache>) -> SyncResult<Self> {
        if config.base_url.trim().is_empty() {
            return Err(SyncError::Config("base_url must not be empty".to_string()));
        }
        let mut builder = Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build()?;

        Ok(Self {
            base_url: Arc::from(config.normalized_base_url()),
            config: Arc::new(config),
            client,
            cache,
            session: Arc::new(RwLock::new(None)),
            session_epoch: Arc::new(AtomicU64::new(0)),
            request_counter: Arc::new(AtomicU64::new(0)),
        })
    }

    /// The shared entity cache.
    pub fn cache(&self) -> &Arc<EntityCache> {
        &self.cache
    }

    /// The client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Base URL with a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the next request number, used to pair request and response
    /// log lines.
    pub fn next_request_number(&self) -> u64 {
        self.request_counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    // ── Session ──────────────────────────────────────────────────

    /// Installs the session used to authorize subsequent requests.
    pub async fn set_session(&self, session: SessionContext) {
        info!("Session set, privileges: {:?}", session.privileges());
        *self.session.write().await = Some(session);
    }

    /// Drops the current session. Requests are sent without a token.
    ///
    /// Responses to requests started before this call are not cached.
    pub async fn clear_session(&self) {
        let mut slot = self.session.write().await;
        self.session_epoch.fetch_add(1, Ordering::AcqRel);
        info!("Session cleared");
        *slot = None;
    }

    /// Switches to another account: replaces the session and empties the
    /// cache so no entity of the previous account survives.
    ///
    /// Responses to requests started before this call, including background
    /// refetches, are not cached.
    pub async fn switch_account(&self, session: SessionContext) {
        let mut slot = self.session.write().await;
        self.session_epoch.fetch_add(1, Ordering::AcqRel);
        self.cache.clear_all();
        info!("Switched account, cache cleared");
        *slot = Some(session);
    }

    /// A copy of the current session.
    pub async fn session(&self) -> Option<SessionContext> {
        self.session.read().await.clone()
    }

    fn epoch(&self) -> u64 {
        self.session_epoch.load(Ordering::Acquire)
    }

    /// Applies `write` to the cache unless the session changed since
    /// `epoch`. Returns false when the write was dropped.
    ///
    /// The session read guard is held across the check and the write, so a
    /// concurrent [`SyncClient::switch_account`] either clears the write's
    /// result or makes the check fail.
    async fn write_if_current<F>(&self, epoch: u64, write: F) -> bool
    where
        F: FnOnce(&EntityCache),
    {
        let _session = self.session.read().await;
        if self.epoch() != epoch {
            debug!("Session changed since the request was sent, response not cached");
            return false;
        }
        write(&self.cache);
        true
    }

    // ── Transport ────────────────────────────────────────────────

    fn type_url(&self, id: &EntityId) -> String {
        format!("{}{}/", self.base_url, urlencoding::encode(&id.type_name()))
    }

    async fn send(&self, method: Method, url: &str, body: Option<&Value>) -> SyncResult<Value> {
        self.send_with(method, url, body, &self.config.language, true)
            .await
    }

    async fn send_with(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        language: &str,
        authenticated: bool,
    ) -> SyncResult<Value> {
        let request_nr = self.next_request_number();
        debug!("REQ {} {} {}", request_nr, method, url);

        let mut request = self
            .client
            .request(method.clone(), url)
            .header("Accept", "application/json")
            .header("Accept-language", language);
        if authenticated {
            let token = self
                .session
                .read()
                .await
                .as_ref()
                .map(|s| s.token().to_string());
            if let Some(token) = token {
                request = request.header("token", token);
            }
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            warn!("RES {} {} {}: HTTP {}", request_nr, method, url, status.as_u16());
            let messages = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|body| error_messages(&body))
                .unwrap_or_default();
            return Err(SyncError::Status {
                status: status.as_u16(),
                url: url.to_string(),
                messages,
            });
        }

        if text.trim().is_empty() {
            debug!("RES {} {} {}: empty body", request_nr, method, url);
            return Ok(Value::Object(serde_json::Map::new()));
        }
        let body: Value = serde_json::from_str(&text)?;
        debug!("RES {} {} {}", request_nr, method, url);
        Ok(body)
    }

    // ── Fetch ────────────────────────────────────────────────────

    /// Fetches `id`, sending the cached version so the server can answer
    /// [`SyncOutcome::UpToDate`] instead of the full entity.
    pub async fn fetch_by_id(&self, id: &EntityId, ignore_cache: bool) -> SyncOutcome {
        self.fetch_in_epoch(id, ignore_cache, self.epoch()).await
    }

    async fn fetch_in_epoch(&self, id: &EntityId, ignore_cache: bool, epoch: u64) -> SyncOutcome {
        if id.is_empty() {
            return SyncOutcome::Success(None);
        }
        let version = if ignore_cache {
            -1
        } else {
            self.cache.get_version(id)
        };
        let mut url = format!("{}{}", self.type_url(id), urlencoding::encode(id.as_str()));
        if version >= 0 {
            url.push_str(&format!("?version={version}"));
        }

        let body = match self.send(Method::GET, &url, None).await {
            Ok(body) => body,
            Err(cause) => {
                warn!("Could not fetch {}: {}", id, cause);
                return SyncOutcome::system(cause);
            }
        };

        if is_up_to_date(&body) {
            debug!("{} is up to date at version {}", id, version);
            return SyncOutcome::UpToDate;
        }
        if let Some(messages) = error_messages(&body) {
            warn!("Server reported errors fetching {}: {:?}", id, messages);
            return SyncOutcome::BusinessError { messages };
        }
        debug!("Fetched {}: {}", id, redact_for_log(&body, id));

        let item = match extract_primary(&body, id) {
            Ok(item) => item,
            Err(cause) => {
                warn!("{}", cause);
                return SyncOutcome::system(cause);
            }
        };
        self.write_if_current(epoch, |cache| {
            absorb_side_entities(cache, &body);
            cache.put(id, item.clone());
        })
        .await;
        SyncOutcome::Success(Some(item))
    }

    /// Fetches the field definitions (form schema) of `id`'s type in
    /// `language`, caching them per type and language.
    pub async fn fetch_definition(&self, id: &EntityId, language: &str) -> SyncOutcome {
        if id.is_empty() {
            return SyncOutcome::Success(None);
        }
        let key = definition_key(id, language);
        if let Some(definition) = self.cache.get_definition(&key) {
            return SyncOutcome::Success(Some(definition));
        }

        let url = format!("{}FieldDefinition", self.type_url(id));
        let body = match self.send_with(Method::GET, &url, None, language, false).await {
            Ok(body) => body,
            Err(cause) => {
                warn!("Could not fetch definition {}: {}", key, cause);
                return SyncOutcome::system(cause);
            }
        };
        match body.get("fields") {
            Some(fields) if !fields.is_null() => {
                self.cache.put_definition(&key, fields.clone());
                SyncOutcome::Success(Some(fields.clone()))
            }
            _ => SyncOutcome::system(SyncError::MissingField("fields")),
        }
    }

    // ── Store ────────────────────────────────────────────────────

    /// Creates (transient id, POST) or updates (persisted id, PUT) `item`.
    ///
    /// Stale error annotations are removed from `item` before sending. Its
    /// `definition` is held back from the request and put back into `item`
    /// before this returns, whatever the outcome.
    pub async fn store_item(&self, item: &mut Value) -> SyncOutcome {
        let Some(id) = item_id(item) else {
            return SyncOutcome::Success(None);
        };
        clear_errors(item);
        let definition = item
            .as_object_mut()
            .and_then(|fields| fields.remove(DEFINITION_FIELD));

        let epoch = self.epoch();
        let outcome = self.submit(&id, item, definition.as_ref(), epoch).await;

        if let (Some(definition), Some(fields)) = (definition, item.as_object_mut()) {
            fields.insert(DEFINITION_FIELD.to_string(), definition);
        }
        outcome
    }

    async fn submit(
        &self,
        id: &EntityId,
        item: &Value,
        definition: Option<&Value>,
        epoch: u64,
    ) -> SyncOutcome {
        let (method, action) = if id.is_persisted() {
            (Method::PUT, "updating")
        } else {
            (Method::POST, "creating")
        };
        let url = self.type_url(id);

        let body = match self.send(method, &url, Some(item)).await {
            Ok(body) => body,
            Err(cause) => return self.store_failure(id, item, definition, cause),
        };
        debug!("Stored {}: {}", id, redact_for_log(&body, id));

        if let Some(rejected) = self.rejection(item, definition, &body, epoch).await {
            return rejected;
        }

        let updated = match body.get(id.envelope_key()) {
            Some(updated) if updated.is_object() => updated.clone(),
            _ => {
                let cause = SyncError::MissingStoredEntity {
                    field: id.envelope_key().to_string(),
                    action,
                };
                return self.store_failure(id, item, definition, cause);
            }
        };
        self.accept(id, updated, &body, epoch).await
    }

    fn store_failure(
        &self,
        id: &EntityId,
        item: &Value,
        definition: Option<&Value>,
        cause: SyncError,
    ) -> SyncOutcome {
        let message = format!("Could not save the {}: {}", id.type_name().to_lowercase(), cause);
        warn!("{}", message);
        let mut failed = item.clone();
        if let Some(fields) = failed.as_object_mut() {
            fields.insert("errors".to_string(), Value::from(vec![message]));
            if let Some(definition) = definition {
                fields.insert(DEFINITION_FIELD.to_string(), definition.clone());
            }
        }
        SyncOutcome::SystemError {
            cause,
            item: Some(failed),
        }
    }

    /// Caches an accepted entity under its (possibly new) id.
    async fn accept(&self, id: &EntityId, updated: Value, body: &Value, epoch: u64) -> SyncOutcome {
        let new_id = item_id(&updated).unwrap_or_else(|| id.clone());
        if new_id != *id {
            debug!("{} was created as {}", id, new_id);
        }
        self.write_if_current(epoch, |cache| {
            absorb_lists(cache, body);
            if new_id != *id {
                cache.remove(id);
            }
            cache.put(&new_id, updated.clone());
        })
        .await;
        SyncOutcome::Success(Some(updated))
    }

    /// Builds the validation outcome for a rejected submit, or `None` if
    /// the server accepted it.
    ///
    /// A rejected persisted entity is evicted and refetched in the
    /// background so the cache never keeps serving the rejected edit.
    async fn rejection(
        &self,
        item: &Value,
        definition: Option<&Value>,
        body: &Value,
        epoch: u64,
    ) -> Option<SyncOutcome> {
        let invalid = has_validation_error(body);
        let errors = error_messages(body);
        if !invalid && errors.is_none() {
            return None;
        }
        let messages = match errors {
            Some(messages) if !messages.is_empty() || !invalid => messages,
            _ => vec![VALIDATION_ERROR_MESSAGE.to_string()],
        };
        warn!("Server rejected the submitted item: {:?}", messages);

        if let Some(id) = item_id(item).filter(EntityId::is_persisted) {
            let evicted = self
                .write_if_current(epoch, |cache| {
                    cache.remove(&id);
                })
                .await;
            if evicted {
                self.spawn_refetch(id, epoch);
            }
        }

        let server_item = item_id(item)
            .and_then(|id| body.get(id.envelope_key()))
            .filter(|entity| entity.is_object())
            .unwrap_or(body);
        let field_errors = field_errors(server_item);

        let rejected = if item.is_object() {
            let mut rejected = item.clone();
            overlay_errors(&mut rejected, server_item);
            if let Some(fields) = rejected.as_object_mut() {
                fields.insert("errors".to_string(), Value::from(messages));
                if let Some(definition) = definition {
                    fields.insert(DEFINITION_FIELD.to_string(), definition.clone());
                }
            }
            rejected
        } else {
            let mut rejected = body.clone();
            if let Some(fields) = rejected.as_object_mut() {
                fields.insert("errors".to_string(), Value::from(messages));
            }
            rejected
        };

        Some(SyncOutcome::ValidationError {
            item: rejected,
            field_errors,
        })
    }

    /// Refreshes `id` from the server without blocking the caller.
    fn spawn_refetch(&self, id: EntityId, epoch: u64) {
        let client = self.clone();
        tokio::spawn(async move {
            match client.fetch_in_epoch(&id, true, epoch).await {
                SyncOutcome::Success(_) => debug!("Refetched {} after rejected edit", id),
                other => warn!("Refetch of {} failed: {:?}", id, other.messages()),
            }
        });
    }

    // ── Actions ──────────────────────────────────────────────────

    /// Performs a server-side state transition (sign, close, lock, ...) on
    /// `item`, or on a batch when `item` is an array.
    ///
    /// Responses follow the same taxonomy as [`SyncClient::store_item`].
    /// A successful batch action returns the response body untouched.
    pub async fn perform_action(&self, action: &str, item: &Value, method: Method) -> SyncOutcome {
        let type_id = match item {
            Value::Array(items) => items.first().and_then(item_id),
            other => item_id(other),
        };
        let Some(type_id) = type_id else {
            return SyncOutcome::system(SyncError::InvalidItem(format!(
                "an item with an id is required to {action}"
            )));
        };
        let epoch = self.epoch();
        let url = format!(
            "{}{}/{}",
            self.base_url,
            urlencoding::encode(&type_id.type_name()),
            urlencoding::encode(action)
        );

        let body = match self.send(method.clone(), &url, Some(item)).await {
            Ok(body) => body,
            Err(cause) => {
                warn!(
                    "Something went wrong trying to {} a {}: {}",
                    action,
                    type_id.type_name(),
                    cause
                );
                return SyncOutcome::system(cause);
            }
        };
        debug!("Performed {} on {}: {}", action, type_id, redact_for_log(&body, &type_id));

        if let Some(rejected) = self.rejection(item, None, &body, epoch).await {
            return rejected;
        }
        if item.is_array() {
            return SyncOutcome::Success(Some(body));
        }

        match body.get(type_id.envelope_key()) {
            Some(updated) if updated.is_object() => {
                self.accept(&type_id, updated.clone(), &body, epoch).await
            }
            _ => SyncOutcome::system(SyncError::MissingStoredEntity {
                field: type_id.envelope_key().to_string(),
                action: if method == Method::PUT {
                    "updating"
                } else {
                    "creating"
                },
            }),
        }
    }

    // ── Delete ───────────────────────────────────────────────────

    /// Deletes a persisted `item`. Transient items are a no-op.
    ///
    /// On success the entity is evicted and removed from every index list;
    /// when the server reports errors the cache is left intact.
    pub async fn delete_item(&self, item: &Value) -> SyncOutcome {
        let Some(id) = item_id(item).filter(EntityId::is_persisted) else {
            return SyncOutcome::Success(None);
        };
        let url = format!("{}{}", self.type_url(&id), urlencoding::encode(id.as_str()));
        let epoch = self.epoch();

        let body = match self.send(Method::DELETE, &url, Some(item)).await {
            Ok(body) => body,
            Err(cause) => {
                warn!("Could not delete {}: {}", id, cause);
                return SyncOutcome::system(cause);
            }
        };
        if let Some(messages) = error_messages(&body) {
            warn!("Server refused to delete {}: {:?}", id, messages);
            return SyncOutcome::BusinessError { messages };
        }

        self.write_if_current(epoch, |cache| {
            cache.remove(&id);
            cache.remove_from_all_lists(&id);
        })
        .await;
        info!("Deleted {}", id);
        SyncOutcome::Success(None)
    }

    // ── Search ───────────────────────────────────────────────────

    /// Runs a list query (e.g. `Visit/list`) and returns the raw envelope.
    ///
    /// Search envelopes carry heterogeneous named lists; absorbing them is
    /// left to the caller (see [`crate::envelope::absorb_lists`]).
    pub async fn search(&self, list_path: &str, criteria: &Value) -> SyncOutcome {
        let url = append_parameters(&format!("{}{}", self.base_url, list_path), criteria);

        let body = match self.send(Method::GET, &url, None).await {
            Ok(body) => body,
            Err(cause) => {
                warn!("Search {} failed: {}", list_path, cause);
                return SyncOutcome::system(cause);
            }
        };
        if let Some(messages) = error_messages(&body) {
            warn!("Server reported errors for search {}: {:?}", list_path, messages);
            return SyncOutcome::BusinessError { messages };
        }
        if let Some(fields) = body.as_object() {
            debug!("Search {} returned {:?}", list_path, fields.keys().collect::<Vec<_>>());
        }
        SyncOutcome::Success(Some(body))
    }

    /// Runs a search, absorbs every returned list into the cache and
    /// replaces the index list `index_key` with the ids of
    /// `envelope[list_field]`.
    pub async fn rebuild_index(
        &self,
        list_path: &str,
        criteria: &Value,
        list_field: &str,
        index_key: &str,
    ) -> SyncOutcome {
        let epoch = self.epoch();
        let outcome = self.search(list_path, criteria).await;
        if let SyncOutcome::Success(Some(envelope)) = &outcome {
            let ids = list_ids(envelope, list_field);
            let count = ids.len();
            let rebuilt = self
                .write_if_current(epoch, |cache| {
                    absorb_lists(cache, envelope);
                    cache.put_list(index_key, ids);
                })
                .await;
            if rebuilt {
                debug!("Index {} rebuilt with {} ids", index_key, count);
            }
        }
        outcome
    }
}
