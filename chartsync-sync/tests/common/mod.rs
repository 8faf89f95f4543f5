//! Shared helpers for sync client tests.

#![allow(dead_code)]

use chartsync_session::{Privileges, SessionContext};
use chartsync_sync::{ClientConfig, SyncClient};
use serde_json::Value;
use std::time::Duration;
use wiremock::MockServer;

pub const TEST_TOKEN: &str = "test-token";

/// Client pointed at the mock server, with a session installed.
pub async fn client_for(server: &MockServer) -> SyncClient {
    let client = anonymous_client_for(server);
    client
        .set_session(SessionContext::with_privileges(TEST_TOKEN, Privileges::none()))
        .await;
    client
}

/// Client pointed at the mock server, without a session.
pub fn anonymous_client_for(server: &MockServer) -> SyncClient {
    let config = ClientConfig {
        base_url: format!("{}/", server.uri()),
        ..Default::default()
    };
    SyncClient::new(config).unwrap()
}

/// JSON bodies of every request the server received.
pub async fn received_bodies(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|req| !req.body.is_empty())
        .map(|req| serde_json::from_slice(&req.body).unwrap())
        .collect()
}

/// Polls `condition` until it holds, for at most two seconds.
pub async fn eventually<F>(condition: F)
where
    F: Fn() -> bool,
{
    for _ in 0..100 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not met within two seconds");
}
