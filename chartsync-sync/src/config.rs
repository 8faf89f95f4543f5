//! Client configuration.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Host used when an account does not name its own EMR server.
pub const DEFAULT_HOST: &str = "emr.chartsync.app";

/// REST API version segment of the base URL.
pub const REST_VERSION: &str = "v1";

/// Account extra-field key naming the account's EMR server.
pub const EMR_HOST_FIELD: &str = "WinkEMRHost";

/// Configuration for the sync client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL every resource path is appended to
    /// (e.g. `https://emr.chartsync.app/v1/`).
    pub base_url: String,
    /// Sent as `Accept-language` on every request.
    pub language: String,
    /// Request timeout in seconds. `None` keeps the HTTP client's default.
    pub timeout_secs: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::for_host(DEFAULT_HOST)
    }
}

impl ClientConfig {
    /// Config pointing at `https://<host>/<REST_VERSION>/`.
    ///
    /// `host` may be given as a full URL; scheme, port, path and query are
    /// stripped.
    #[must_use]
    pub fn for_host(host: &str) -> Self {
        Self {
            base_url: format!("https://{}/{}/", extract_hostname(host), REST_VERSION),
            language: "en".to_string(),
            timeout_secs: None,
        }
    }

    /// Base URL with exactly one trailing slash.
    #[must_use]
    pub fn normalized_base_url(&self) -> String {
        format!("{}/", self.base_url.trim_end_matches('/'))
    }
}

/// Reduces `url` to its bare hostname.
#[must_use]
pub fn extract_hostname(url: &str) -> String {
    let url = url.trim();
    let without_scheme = match url.find("//") {
        Some(pos) => &url[pos + 2..],
        None => url,
    };
    without_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default()
        .split(':')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// EMR host configured on an account record, falling back to
/// [`DEFAULT_HOST`].
///
/// The host is read from the account's `extraFields` array, an array of
/// `{key, value}` objects.
#[must_use]
pub fn host_from_account(account: &Value) -> String {
    account
        .get("extraFields")
        .and_then(Value::as_array)
        .and_then(|fields| {
            fields
                .iter()
                .find(|field| field.get("key").and_then(Value::as_str) == Some(EMR_HOST_FIELD))
        })
        .and_then(|field| field.get("value").and_then(Value::as_str))
        .filter(|host| !host.trim().is_empty())
        .unwrap_or(DEFAULT_HOST)
        .to_string()
}
