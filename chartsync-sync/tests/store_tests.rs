mod common;

use chartsync_sync::{SyncError, SyncOutcome, VALIDATION_ERROR_MESSAGE};
use chartsync_types::EntityId;
use common::{client_for, eventually, received_bodies};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{method, path, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn create_assigns_persisted_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/Visit/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "visit": {"id": "visit-501", "version": 0, "patientId": "patient-77"},
            "userList": [{"id": "user-3", "name": "Dr. Lee"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let transient = EntityId::transient("visit");
    client
        .cache()
        .put(&transient, json!({"id": "visit", "patientId": "patient-77"}));

    let mut visit = json!({"id": "visit", "patientId": "patient-77"});
    let outcome = client.store_item(&mut visit).await;

    assert!(outcome.is_success());
    assert_eq!(outcome.item().unwrap()["id"], "visit-501");
    let cache = client.cache();
    assert_eq!(cache.get_version(&EntityId::from("visit-501")), 0);
    assert!(!cache.contains(&transient));
    assert!(cache.contains(&EntityId::from("user-3")));
}

#[tokio::test]
async fn update_uses_put_and_replaces_cache() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/Exam/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "exam": {"id": "exam-8", "version": 3, "status": "done"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let id = EntityId::from("exam-8");
    client
        .cache()
        .put(&id, json!({"id": "exam-8", "version": 2, "status": "open"}));

    let mut exam = json!({"id": "exam-8", "version": 2, "status": "done"});
    let outcome = client.store_item(&mut exam).await;

    assert!(outcome.is_success());
    assert_eq!(client.cache().get_version(&id), 3);
    assert_eq!(client.cache().get(&id).unwrap()["status"], "done");
}

#[tokio::test]
async fn definition_and_stale_errors_are_not_sent() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/Visit/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "visit": {"id": "visit-12", "version": 5}
        })))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let definition = json!({"fields": [{"name": "date"}]});
    let mut visit = json!({
        "id": "visit-12",
        "version": 4,
        "date": "2026-10-01",
        "dateError": "Date is required",
        "errors": ["old"],
        "refraction": {"sphere": 1.25, "sphereError": "out of range"},
        "definition": definition.clone()
    });

    client.store_item(&mut visit).await;

    let bodies = received_bodies(&server).await;
    assert_eq!(
        bodies,
        vec![json!({
            "id": "visit-12",
            "version": 4,
            "date": "2026-10-01",
            "refraction": {"sphere": 1.25}
        })]
    );
    assert_eq!(visit["definition"], definition);
    assert!(visit.get("dateError").is_none());
}

#[tokio::test]
async fn item_without_id_is_a_no_op() {
    let server = MockServer::start().await;
    let client = client_for(&server).await;

    let mut item = json!({"patientId": "patient-77"});
    let outcome = client.store_item(&mut item).await;

    assert!(matches!(outcome, SyncOutcome::Success(None)));
    assert!(server.received_requests().await.unwrap().is_empty());
}

// ── Validation ───────────────────────────────────────────────────

#[tokio::test]
async fn rejected_update_evicts_and_refetches() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/Visit/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "hasValidationError": true,
            "visit": {"id": "visit-12", "version": 2, "dateError": "Date is required"}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/Visit/visit-12"))
        .and(query_param_is_missing("version"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "visit-12", "version": 3, "date": "2026-09-30"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let id = EntityId::from("visit-12");
    client.cache().put(&id, json!({"id": "visit-12", "version": 2}));

    let definition = json!({"fields": []});
    let mut visit = json!({
        "id": "visit-12",
        "version": 2,
        "date": null,
        "definition": definition.clone()
    });
    let outcome = client.store_item(&mut visit).await;

    match &outcome {
        SyncOutcome::ValidationError { item, field_errors } => {
            assert_eq!(field_errors.get("dateError").map(String::as_str), Some("Date is required"));
            assert_eq!(item["dateError"], "Date is required");
            assert_eq!(item["errors"], json!([VALIDATION_ERROR_MESSAGE]));
            assert_eq!(item["definition"], definition);
        }
        other => panic!("expected validation error, got {other:?}"),
    }
    assert_eq!(outcome.messages(), vec![VALIDATION_ERROR_MESSAGE.to_string()]);
    assert_eq!(visit["definition"], definition);

    let cache = client.cache().clone();
    let refreshed = id.clone();
    eventually(move || cache.get_version(&refreshed) == 3).await;
    assert_eq!(client.cache().get(&id).unwrap()["date"], "2026-09-30");
}

#[tokio::test]
async fn errors_on_store_are_validation_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/Patient/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errors": ["A patient with this health card already exists."]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let mut patient = json!({"id": "patient", "healthCard": "1234"});
    let outcome = client.store_item(&mut patient).await;

    match outcome {
        SyncOutcome::ValidationError { item, field_errors } => {
            assert_eq!(
                item["errors"],
                json!(["A patient with this health card already exists."])
            );
            assert!(field_errors.is_empty());
        }
        other => panic!("expected validation error, got {other:?}"),
    }
    // Transient items are never evicted or refetched.
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

// ── System errors ────────────────────────────────────────────────

#[tokio::test]
async fn http_failure_annotates_the_item() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/Visit/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let id = EntityId::from("visit-12");
    client.cache().put(&id, json!({"id": "visit-12", "version": 2}));

    let definition = json!({"fields": []});
    let mut visit = json!({"id": "visit-12", "version": 2, "definition": definition.clone()});
    let outcome = client.store_item(&mut visit).await;

    match outcome {
        SyncOutcome::SystemError { cause, item } => {
            assert_eq!(cause.status(), Some(500));
            let item = item.expect("store failures carry the item");
            let errors = item["errors"].as_array().unwrap();
            assert_eq!(errors.len(), 1);
            assert!(errors[0].as_str().unwrap().starts_with("Could not save the visit: "));
            assert_eq!(item["definition"], definition);
        }
        other => panic!("expected system error, got {other:?}"),
    }
    assert_eq!(client.cache().get_version(&id), 2);
}

#[tokio::test]
async fn response_without_entity_is_a_system_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/Visit/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"patient": {}})))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let mut visit = json!({"id": "visit"});
    let outcome = client.store_item(&mut visit).await;

    match outcome {
        SyncOutcome::SystemError { cause, item } => {
            assert!(matches!(
                cause,
                SyncError::MissingStoredEntity {
                    action: "creating",
                    ..
                }
            ));
            assert!(item.is_some());
        }
        other => panic!("expected system error, got {other:?}"),
    }
}
