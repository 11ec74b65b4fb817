//! Client deletion cascade and client id resolution.

use serde_json::json;
use std::sync::Arc;

use servetrack_core::{defaults, Collection, Error, NewClient};
use servetrack_gateway::{Gateway, GatewayConfig, MemoryStore, StoreCall};

const CLIENTS: &str = "clients";
const CASES: &str = "client_cases";
const SERVES: &str = "serve_attempts";
const DOCUMENTS: &str = "client_documents";
const BUCKET: &str = "client_documents";

fn setup() -> (Gateway, MemoryStore) {
    let store = MemoryStore::new();
    let gateway = Gateway::new(GatewayConfig::default(), Arc::new(store.clone())).unwrap();
    (gateway, store)
}

fn seed_family(store: &MemoryStore) {
    store.seed(CLIENTS, json!({"$id": "c1", "name": "Acme"}));
    store.seed(CLIENTS, json!({"$id": "c2", "name": "Other"}));
    for id in ["k1", "k2"] {
        store.seed(CASES, json!({"$id": id, "client_id": "c1", "case_number": id}));
    }
    for id in ["s1", "s2", "s3"] {
        store.seed(
            SERVES,
            json!({"$id": id, "client_id": "c1", "timestamp": "2024-01-01T00:00:00.000Z"}),
        );
    }
    store.seed(SERVES, json!({"$id": "s9", "client_id": "c2"}));
    store.seed(
        DOCUMENTS,
        json!({"$id": "d1", "client_id": "c1", "file_id": "file1", "file_name": "a.pdf"}),
    );
    store.seed_file(BUCKET, "file1");
}

#[tokio::test]
async fn test_cascade_continues_past_failed_serve_delete() {
    let (gateway, store) = setup();
    seed_family(&store);
    store.fail_delete_of("s2");

    let report = gateway.delete_client("c1").await.unwrap();

    assert_eq!(report.cases_deleted, 2);
    assert_eq!(report.serve_attempts_deleted, 2);
    assert_eq!(report.documents_deleted, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].collection, Collection::ServeAttempts);
    assert_eq!(report.failures[0].document_id.as_deref(), Some("s2"));

    assert!(!store.contains(CASES, "k1"));
    assert!(!store.contains(CASES, "k2"));
    assert!(!store.contains(SERVES, "s1"));
    assert!(store.contains(SERVES, "s2"));
    assert!(!store.contains(SERVES, "s3"));
    assert!(!store.contains(DOCUMENTS, "d1"));
    assert!(!store.file_exists(BUCKET, "file1"));
    assert!(!store.contains(CLIENTS, "c1"));

    assert!(store.contains(CLIENTS, "c2"));
    assert!(store.contains(SERVES, "s9"));
}

#[tokio::test]
async fn test_cascade_order_is_cases_serves_documents_then_client() {
    let (gateway, store) = setup();
    seed_family(&store);
    store.clear_calls();

    gateway.delete_client("c1").await.unwrap();

    let deletes: Vec<String> = store
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            StoreCall::Delete { collection, .. } => Some(collection),
            _ => None,
        })
        .collect();
    assert_eq!(
        deletes,
        vec![CASES, CASES, SERVES, SERVES, SERVES, DOCUMENTS, CLIENTS]
    );
}

#[tokio::test]
async fn test_cascade_with_invalid_file_ref_still_removes_metadata() {
    let (gateway, store) = setup();
    store.seed(CLIENTS, json!({"$id": "c1", "name": "Acme"}));
    store.seed(
        DOCUMENTS,
        json!({"$id": "d1", "client_id": "c1", "file_id": "_bad-ref"}),
    );

    let report = gateway.delete_client("c1").await.unwrap();

    assert!(report.is_complete());
    assert_eq!(report.documents_deleted, 1);
    assert!(!store.contains(DOCUMENTS, "d1"));
    assert!(!store
        .calls()
        .iter()
        .any(|c| matches!(c, StoreCall::DeleteFile { .. })));
}

#[tokio::test]
async fn test_cascade_pages_past_one_listing() {
    let (gateway, store) = setup();
    store.seed(CLIENTS, json!({"$id": "c1", "name": "Acme"}));
    let owned = defaults::INTERNAL_FETCH_LIMIT as usize + 3;
    for n in 0..owned {
        store.seed(SERVES, json!({"$id": format!("s{}", n), "client_id": "c1"}));
    }
    store.seed(SERVES, json!({"$id": "other", "client_id": "c2"}));

    let report = gateway.delete_client("c1").await.unwrap();

    assert!(report.is_complete());
    assert_eq!(report.serve_attempts_deleted, owned);
    let remaining: Vec<String> = store
        .documents(SERVES)
        .iter()
        .filter_map(|d| d["$id"].as_str().map(str::to_string))
        .collect();
    assert_eq!(remaining, vec!["other".to_string()]);
}

#[tokio::test]
async fn test_delete_missing_client_reports_not_found() {
    let (gateway, _store) = setup();
    let err = gateway.delete_client("ghost").await.unwrap_err();
    assert!(matches!(err, Error::ClientNotFound(_)));
}

#[tokio::test]
async fn test_client_crud_round() {
    let (gateway, _store) = setup();
    let created = gateway
        .create_client(NewClient {
            name: "Acme".to_string(),
            email: "legal@acme.test".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();

    let fetched = gateway.get_client(&created.id).await.unwrap();
    assert_eq!(fetched, created);

    let blank = gateway.create_client(NewClient::default()).await;
    assert!(matches!(blank, Err(Error::InvalidInput(_))));
}

#[tokio::test]
async fn test_resolve_client_id_via_case() {
    let (gateway, store) = setup();
    store.seed(CASES, json!({"$id": "k1", "client_id": "c1"}));
    assert_eq!(gateway.resolve_client_id("c1").await.as_deref(), Some("c1"));
}

#[tokio::test]
async fn test_resolve_client_id_via_document() {
    let (gateway, store) = setup();
    store.seed(DOCUMENTS, json!({"$id": "d1", "client_id": "c1"}));
    assert_eq!(gateway.resolve_client_id("c1").await.as_deref(), Some("c1"));
}

#[tokio::test]
async fn test_resolve_client_id_via_serve_attempt() {
    let (gateway, store) = setup();
    store.seed(SERVES, json!({"$id": "s1", "client_id": "c1"}));
    assert_eq!(gateway.resolve_client_id("c1").await.as_deref(), Some("c1"));
}

#[tokio::test]
async fn test_resolve_client_id_unresolvable() {
    let (gateway, store) = setup();
    store.seed(SERVES, json!({"$id": "s1", "client_id": "someone-else"}));
    assert!(gateway.resolve_client_id("c1").await.is_none());
}

#[tokio::test]
async fn test_resolve_client_id_search_order() {
    let (gateway, store) = setup();
    store.seed(CASES, json!({"$id": "k1", "client_id": "c1"}));
    store.seed(SERVES, json!({"$id": "s1", "client_id": "c1"}));
    store.clear_calls();

    gateway.resolve_client_id("c1").await;

    let lists: Vec<_> = store
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            StoreCall::List { collection } => Some(collection),
            _ => None,
        })
        .collect();
    assert_eq!(lists, vec![CASES]);
}
