//! Serve attempt behavior against the in-memory backend.

use serde_json::json;
use std::sync::Arc;

use servetrack_core::{
    Collection, Coordinates, Error, FeedEvent, NewServeAttempt, ServeAttemptUpdate, ServeStatus,
};
use servetrack_gateway::{Gateway, GatewayConfig, MemoryStore, NotificationOutcome, StoreCall};

const SERVES: &str = "serve_attempts";
const CLIENTS: &str = "clients";

fn setup() -> (Gateway, MemoryStore) {
    let store = MemoryStore::new();
    let gateway = Gateway::new(GatewayConfig::default(), Arc::new(store.clone())).unwrap();
    (gateway, store)
}

fn seed_client(store: &MemoryStore) {
    store.seed(
        CLIENTS,
        json!({
            "$id": "c1",
            "name": "Acme Corp",
            "email": "legal@acme.test",
            "additional_emails": ["ops@acme.test"]
        }),
    );
}

/// Seeds `n` serves with images, `s0` newest.
fn seed_serves(store: &MemoryStore, n: usize) {
    for i in 0..n {
        store.seed(
            SERVES,
            json!({
                "$id": format!("s{}", i),
                "client_id": "c1",
                "status": "failed",
                "image_data": "data:image/png;base64,AAAA",
                "timestamp": format!("2024-01-01T00:{:02}:00.000Z", 59 - i),
            }),
        );
    }
}

#[tokio::test]
async fn test_first_page_keeps_images_for_twenty_newest_only() {
    let (gateway, store) = setup();
    seed_serves(&store, 30);

    let page = gateway.try_list_serve_attempts(100, 0).await.unwrap();
    assert_eq!(page.len(), 30);
    assert_eq!(page[0].id, "s0");
    for (i, serve) in page.iter().enumerate() {
        assert_eq!(serve.has_image(), i < 20, "position {}", i);
    }
}

#[tokio::test]
async fn test_later_pages_never_carry_images() {
    let (gateway, store) = setup();
    seed_serves(&store, 30);

    let page = gateway.try_list_serve_attempts(10, 5).await.unwrap();
    assert_eq!(page.len(), 10);
    assert_eq!(page[0].id, "s5");
    assert!(page.iter().all(|s| s.image_data.is_none()));
}

#[tokio::test]
async fn test_list_degrades_to_empty_on_read_failure() {
    let (gateway, store) = setup();
    seed_serves(&store, 3);
    store.fail_reads(true);

    assert!(gateway.try_list_serve_attempts(100, 0).await.is_err());
    assert!(gateway.list_serve_attempts(100, 0).await.is_empty());
}

#[tokio::test]
async fn test_create_resolves_client_name_and_canonicalizes_coordinates() {
    let (gateway, store) = setup();
    seed_client(&store);

    let created = gateway
        .create_serve_attempt(NewServeAttempt {
            client_id: "c1".to_string(),
            status: ServeStatus::Completed,
            coordinates: Some(Coordinates::Point {
                latitude: 12.34,
                longitude: 56.78,
            }),
            ..Default::default()
        })
        .await
        .unwrap();

    let serve = &created.record;
    assert_eq!(serve.client_name, "Acme Corp");
    assert_eq!(serve.coordinates.as_deref(), Some("12.34,56.78"));
    assert_eq!(serve.case_number, "unknown");
    assert_eq!(serve.attempt_number, 1);

    let raw = store.document(SERVES, &serve.id).unwrap();
    assert_eq!(raw["coordinates"], "12.34,56.78");
    assert_eq!(raw["client_name"], "Acme Corp");
}

#[tokio::test]
async fn test_create_keeps_string_coordinates() {
    let (gateway, store) = setup();
    seed_client(&store);

    let created = gateway
        .create_serve_attempt(NewServeAttempt {
            client_id: "c1".to_string(),
            client_name: Some("Given Name".to_string()),
            coordinates: Some(Coordinates::Text("40.7128,-74.0060".to_string())),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(created.record.client_name, "Given Name");
    assert_eq!(created.record.coordinates.as_deref(), Some("40.7128,-74.0060"));
}

#[tokio::test]
async fn test_create_falls_back_to_unknown_client() {
    let (gateway, store) = setup();

    let created = gateway
        .create_serve_attempt(NewServeAttempt {
            client_id: "missing".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(created.record.client_name, "Unknown Client");
    assert!(store.contains(SERVES, &created.record.id));
}

#[tokio::test]
async fn test_create_requires_client_id() {
    let (gateway, store) = setup();

    let result = gateway.create_serve_attempt(NewServeAttempt::default()).await;
    assert!(matches!(result, Err(Error::InvalidInput(_))));
    assert!(store.write_calls().is_empty());
}

#[tokio::test]
async fn test_notification_failure_does_not_fail_create() {
    let (gateway, store) = setup();
    seed_client(&store);
    store.fail_functions(true);

    let created = gateway
        .create_serve_attempt(NewServeAttempt {
            client_id: "c1".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();

    assert!(store.contains(SERVES, &created.record.id));
    let ticket = created.notification.expect("notification queued");
    assert!(matches!(ticket.outcome().await, NotificationOutcome::Failed(_)));
}

#[tokio::test]
async fn test_create_notification_copies_business_address() {
    let (gateway, store) = setup();
    seed_client(&store);

    let created = gateway
        .create_serve_attempt(NewServeAttempt {
            client_id: "c1".to_string(),
            image_data: Some("data:image/jpeg;base64,/9j/".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

    let outcome = created.notification.unwrap().outcome().await;
    assert_eq!(outcome, NotificationOutcome::Sent);

    let executions = store.executions();
    assert_eq!(executions.len(), 1);
    assert_eq!(
        executions[0]["to"],
        json!(["legal@acme.test", "ops@acme.test", "info@justlegalsolutions.org"])
    );
    assert_eq!(executions[0]["attachments"][0]["contentType"], "image/jpeg");
}

#[tokio::test]
async fn test_identical_update_writes_nothing() {
    let (gateway, store) = setup();
    seed_client(&store);
    store.seed(
        SERVES,
        json!({
            "$id": "s1",
            "client_id": "c1",
            "case_number": "CV-1",
            "case_name": "Acme v. Doe",
            "status": "failed",
            "notes": "No answer",
            "timestamp": "2024-03-01T09:30:00.000Z",
        }),
    );
    let stored = gateway.get_serve_attempt("s1").await.unwrap();
    store.clear_calls();

    let result = gateway
        .update_serve_attempt(
            "s1",
            ServeAttemptUpdate {
                notes: Some("No answer".to_string()),
                status: Some(ServeStatus::Failed),
                case_number: Some("CV-1".to_string()),
                case_name: Some("Acme v. Doe".to_string()),
                address: Some("somewhere else".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(result.record, stored);
    assert!(result.notification.is_none());
    assert!(store.write_calls().is_empty());
}

#[tokio::test]
async fn test_update_writes_only_changed_mutable_fields() {
    let (gateway, store) = setup();
    seed_client(&store);
    store.seed(
        SERVES,
        json!({
            "$id": "s1",
            "client_id": "c1",
            "status": "failed",
            "notes": "No answer",
            "timestamp": "2024-03-01T09:30:00.000Z",
        }),
    );
    let mut feed = gateway.subscribe(&[Collection::ServeAttempts]);

    let result = gateway
        .update_serve_attempt(
            "s1",
            ServeAttemptUpdate {
                status: Some(ServeStatus::Completed),
                notes: Some("No answer".to_string()),
                client_id: Some("c2".to_string()),
                attempt_number: Some(9),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(result.record.status, ServeStatus::Completed);
    assert_eq!(result.record.client_id, "c1");

    let updates: Vec<_> = store
        .write_calls()
        .into_iter()
        .filter_map(|c| match c {
            StoreCall::Update { data, .. } => Some(data),
            _ => None,
        })
        .collect();
    assert_eq!(updates, vec![json!({"status": "completed"})]);

    match feed.recv().await {
        Some(FeedEvent::Change(event)) => assert_eq!(event.event_type, "serve_attempts.updated"),
        other => panic!("expected update event, got {:?}", other),
    }

    let outcome = result.notification.expect("owner notified").outcome().await;
    assert!(outcome.is_sent());
}

#[tokio::test]
async fn test_get_missing_serve_attempt() {
    let (gateway, _store) = setup();
    let err = gateway.get_serve_attempt("nope").await.unwrap_err();
    assert!(matches!(err, Error::ServeAttemptNotFound(_)));
}
