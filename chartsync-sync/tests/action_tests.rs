mod common;

use chartsync_sync::{Method, SyncError, SyncOutcome};
use chartsync_types::EntityId;
use common::{client_for, received_bodies};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn action_on_single_item_updates_cache() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/Visit/sign"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "visit": {"id": "visit-12", "version": 5, "signed": true}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let id = EntityId::from("visit-12");
    client.cache().put(&id, json!({"id": "visit-12", "version": 4}));

    let visit = json!({"id": "visit-12", "version": 4});
    let outcome = client.perform_action("sign", &visit, Method::POST).await;

    assert!(outcome.is_success());
    assert_eq!(client.cache().get_version(&id), 5);
    assert_eq!(received_bodies(&server).await, vec![visit]);
}

#[tokio::test]
async fn batch_action_returns_body_untouched() {
    let server = MockServer::start().await;
    let response = json!({"closed": 2});
    Mock::given(method("PUT"))
        .and(path("/Appointment/close"))
        .respond_with(ResponseTemplate::new(200).set_body_json(response.clone()))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let batch = json!([{"id": "appointment-1"}, {"id": "appointment-2"}]);
    let outcome = client.perform_action("close", &batch, Method::PUT).await;

    assert_eq!(outcome.item(), Some(&response));
    assert_eq!(received_bodies(&server).await, vec![batch]);
}

#[tokio::test]
async fn action_needs_an_item_with_an_id() {
    let server = MockServer::start().await;
    let client = client_for(&server).await;

    for item in [json!([]), json!({"status": "open"}), json!({"id": ""})] {
        let outcome = client.perform_action("sign", &item, Method::POST).await;
        assert!(matches!(
            outcome,
            SyncOutcome::SystemError {
                cause: SyncError::InvalidItem(_),
                ..
            }
        ));
    }
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn rejected_action_evicts_persisted_item() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/Visit/lock"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errors": ["The visit must be signed before it can be locked."]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let id = EntityId::from("visit-12");
    client.cache().put(&id, json!({"id": "visit-12", "version": 4}));

    let outcome = client
        .perform_action("lock", &json!({"id": "visit-12"}), Method::POST)
        .await;

    match &outcome {
        SyncOutcome::ValidationError { item, .. } => {
            assert_eq!(item["id"], "visit-12");
            assert_eq!(
                item["errors"],
                json!(["The visit must be signed before it can be locked."])
            );
        }
        other => panic!("expected validation error, got {other:?}"),
    }
    // The background refetch hits no mock and leaves the entry evicted.
    assert!(!client.cache().contains(&id));
}

#[tokio::test]
async fn rejected_batch_reports_on_the_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/Claim/submit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "hasValidationError": true,
            "failed": 1
        })))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let batch = json!([{"id": "claim"}]);
    let outcome = client.perform_action("submit", &batch, Method::POST).await;

    match outcome {
        SyncOutcome::ValidationError { item, .. } => {
            assert_eq!(item["failed"], 1);
            assert_eq!(
                item["errors"],
                json!([chartsync_sync::VALIDATION_ERROR_MESSAGE])
            );
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

// ── Delete ───────────────────────────────────────────────────────

#[tokio::test]
async fn delete_evicts_entity_and_list_membership() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/Visit/visit-12"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let cache = client.cache();
    let id = EntityId::from("visit-12");
    cache.put(&id, json!({"id": "visit-12", "version": 4}));
    cache.put_list(
        "visitHistory-patient-77",
        vec![EntityId::from("visit-11"), id.clone()],
    );

    let visit = json!({"id": "visit-12", "version": 4});
    let outcome = client.delete_item(&visit).await;

    assert!(matches!(outcome, SyncOutcome::Success(None)));
    assert!(!cache.contains(&id));
    assert_eq!(
        cache.get_list("visitHistory-patient-77"),
        Some(vec![EntityId::from("visit-11")])
    );
    assert_eq!(received_bodies(&server).await, vec![visit]);
}

#[tokio::test]
async fn refused_delete_keeps_cache() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/Visit/visit-12"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errors": ["A signed visit cannot be deleted."]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let id = EntityId::from("visit-12");
    client.cache().put(&id, json!({"id": "visit-12", "version": 4}));

    let outcome = client.delete_item(&json!({"id": "visit-12"})).await;

    assert_eq!(outcome.messages(), vec!["A signed visit cannot be deleted.".to_string()]);
    assert!(matches!(outcome, SyncOutcome::BusinessError { .. }));
    assert!(client.cache().contains(&id));
}

#[tokio::test]
async fn delete_of_transient_item_is_a_no_op() {
    let server = MockServer::start().await;
    let client = client_for(&server).await;

    let outcome = client.delete_item(&json!({"id": "visit"})).await;

    assert!(matches!(outcome, SyncOutcome::Success(None)));
    assert!(server.received_requests().await.unwrap().is_empty());
}
