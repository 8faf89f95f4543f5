//! Commands and helpers for the `chartsync` binary.

use anyhow::{bail, Context, Result};
use chartsync_sync::{ClientConfig, Method, SyncClient, SyncOutcome};
use chartsync_types::EntityId;
use clap::{Subcommand, ValueEnum};
use serde_json::{json, Map, Value};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Fetch an entity by id
    Fetch {
        id: String,
        /// Fetch unconditionally instead of sending the cached version
        #[arg(long)]
        ignore_cache: bool,
    },
    /// Fetch the field definitions of an entity type
    Definition {
        /// Any id of the type, e.g. `visit` or `visit-12`
        id: String,
        /// Definition language (defaults to the client language)
        #[arg(short, long)]
        language: Option<String>,
    },
    /// Create or update an entity read from a JSON file (`-` for stdin)
    Store { file: PathBuf },
    /// Delete an entity by id
    Delete { id: String },
    /// Perform a server-side action on an entity or a batch read from a JSON file
    Action {
        action: String,
        file: PathBuf,
        #[arg(short, long, value_enum, default_value_t = ActionMethod::Put)]
        method: ActionMethod,
    },
    /// Run a list query, e.g. `search Visit/list patientId=patient-77`
    Search {
        path: String,
        /// Criteria as key=value pairs
        criteria: Vec<String>,
    },
    /// Run a list query and rebuild a cached index list from one of its lists
    Index {
        path: String,
        /// Envelope field holding the list, e.g. `visitList`
        list_field: String,
        /// Cache key of the index, e.g. `visitHistory-patient-77`
        index_key: String,
        criteria: Vec<String>,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionMethod {
    Post,
    Put,
}

impl From<ActionMethod> for Method {
    fn from(method: ActionMethod) -> Self {
        match method {
            ActionMethod::Post => Method::POST,
            ActionMethod::Put => Method::PUT,
        }
    }
}

/// Command-line overrides applied on top of the config file.
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    pub host: Option<String>,
    pub base_url: Option<String>,
    pub language: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// Loads the client config from `path` (or defaults) and applies
/// `overrides`. An explicit base URL wins over a host.
pub fn load_config(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<ClientConfig> {
    let mut config = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?
        }
        None => ClientConfig::default(),
    };

    if let Some(host) = &overrides.host {
        config.base_url = ClientConfig::for_host(host).base_url;
    }
    if let Some(base_url) = &overrides.base_url {
        config.base_url = base_url.clone();
    }
    if let Some(language) = &overrides.language {
        config.language = language.clone();
    }
    if overrides.timeout_secs.is_some() {
        config.timeout_secs = overrides.timeout_secs;
    }
    Ok(config)
}

/// Parses `key=value` pairs into a criteria object.
///
/// Values that parse as JSON (numbers, booleans, null) keep their type;
/// anything else is taken as a string.
pub fn parse_criteria(pairs: &[String]) -> Result<Value> {
    let mut criteria = Map::new();
    for pair in pairs {
        let Some((key, raw)) = pair.split_once('=') else {
            bail!("Invalid criterion {:?}, expected key=value", pair);
        };
        if key.is_empty() {
            bail!("Invalid criterion {:?}, key is empty", pair);
        }
        let value = serde_json::from_str::<Value>(raw)
            .ok()
            .filter(|v| !v.is_object() && !v.is_array())
            .unwrap_or_else(|| Value::String(raw.to_string()));
        criteria.insert(key.to_string(), value);
    }
    Ok(Value::Object(criteria))
}

/// Reads a JSON item from `path`, or from stdin when `path` is `-`.
pub fn read_item(path: &Path) -> Result<Value> {
    let raw = if path == Path::new("-") {
        let mut raw = String::new();
        std::io::stdin()
            .read_to_string(&mut raw)
            .context("Failed to read item from stdin")?;
        raw
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read item file {}", path.display()))?
    };
    serde_json::from_str(&raw).context("Item is not valid JSON")
}

/// Runs `command` against `client`.
pub async fn execute(client: &SyncClient, command: &Command) -> Result<SyncOutcome> {
    debug!("Executing {:?}", command);
    let outcome = match command {
        Command::Fetch { id, ignore_cache } => {
            client.fetch_by_id(&EntityId::from(id.as_str()), *ignore_cache).await
        }
        Command::Definition { id, language } => {
            let language = language
                .clone()
                .unwrap_or_else(|| client.config().language.clone());
            client
                .fetch_definition(&EntityId::from(id.as_str()), &language)
                .await
        }
        Command::Store { file } => {
            let mut item = read_item(file)?;
            client.store_item(&mut item).await
        }
        Command::Delete { id } => client.delete_item(&json!({ "id": id })).await,
        Command::Action {
            action,
            file,
            method,
        } => {
            let item = read_item(file)?;
            client
                .perform_action(action, &item, Method::from(*method))
                .await
        }
        Command::Search { path, criteria } => {
            client.search(path, &parse_criteria(criteria)?).await
        }
        Command::Index {
            path,
            list_field,
            index_key,
            criteria,
        } => {
            client
                .rebuild_index(path, &parse_criteria(criteria)?, list_field, index_key)
                .await
        }
    };
    Ok(outcome)
}

/// Renders an outcome as the JSON document printed by the binary.
pub fn render(outcome: &SyncOutcome) -> Value {
    match outcome {
        SyncOutcome::Success(item) => json!({"status": "success", "item": item}),
        SyncOutcome::UpToDate => json!({"status": "upToDate"}),
        SyncOutcome::ValidationError { item, field_errors } => json!({
            "status": "validationError",
            "item": item,
            "fieldErrors": field_errors
        }),
        SyncOutcome::BusinessError { messages } => {
            json!({"status": "businessError", "messages": messages})
        }
        SyncOutcome::SystemError { cause, item } => json!({
            "status": "systemError",
            "messages": [cause.to_string()],
            "httpStatus": cause.status(),
            "item": item
        }),
    }
}
