//! Normalization properties over a spread of heterogeneous raw records.

use serde_json::{json, Value as JsonValue};

use servetrack_core::{normalize_serve_attempt, normalize_serve_attempts, ServeStatus};

fn corpus() -> Vec<JsonValue> {
    vec![
        json!({}),
        json!(null),
        json!({"$id": "a", "client_id": "c1", "timestamp": "2024-02-29T23:59:59Z"}),
        json!({"id": "b", "clientId": "c1", "timestamp": 1_709_251_200_000u64, "status": "COMPLETED"}),
        json!({"id": "c", "timestamp": {"seconds": 1_709_251_200, "nanoseconds": 500_000_000}}),
        json!({"id": "d", "timestamp": "not a date", "$createdAt": "2024-01-01T00:00:00.000+00:00"}),
        json!({"id": "e", "timestamp": "yesterday"}),
        json!({"id": "f", "coordinates": {"latitude": -33.8688, "longitude": 151.2093}}),
        json!({"id": "g", "coordinates": "51.5074,-0.1278", "attemptNumber": "3"}),
        json!({"id": "h", "attempt_number": 0, "status": 42, "notes": null}),
        json!({"id": "i", "imageData": "data:image/png;base64,AAAA", "caseNumber": ""}),
    ]
}

#[test]
fn test_normalizing_twice_equals_normalizing_once() {
    for raw in corpus() {
        let once = normalize_serve_attempt(&raw);
        let twice = normalize_serve_attempt(&serde_json::to_value(&once).unwrap());
        assert_eq!(once, twice, "raw record: {}", raw);
    }
}

#[test]
fn test_every_field_populated_with_defaults() {
    for serve in normalize_serve_attempts(&corpus()) {
        assert!(serve.attempt_number >= 1);
        assert!(!serve.case_number.is_empty());
        assert!(!serve.case_name.is_empty());
        assert!(!serve.client_name.is_empty());
    }

    let empty = normalize_serve_attempt(&json!({}));
    assert_eq!(empty.status, ServeStatus::Unknown);
    assert_eq!(empty.case_number, "unknown");
    assert_eq!(empty.case_name, "unknown");
    assert_eq!(empty.notes, "");
    assert_eq!(empty.address, "");
    assert_eq!(empty.coordinates, None);
    assert_eq!(empty.image_data, None);
    assert_eq!(empty.attempt_number, 1);
}

#[test]
fn test_batch_preserves_order_and_length() {
    let raw = corpus();
    let out = normalize_serve_attempts(&raw);
    assert_eq!(out.len(), raw.len());
    assert_eq!(out[2].id, "a");
    assert_eq!(out[10].id, "i");
}

#[test]
fn test_canonical_output_uses_camel_case_keys() {
    let serve = normalize_serve_attempt(&json!({"$id": "a", "client_id": "c1"}));
    let value = serde_json::to_value(&serve).unwrap();
    for key in ["clientId", "clientName", "caseNumber", "caseName", "imageData", "attemptNumber"] {
        assert!(value.get(key).is_some(), "missing {}", key);
    }
    assert!(value.get("client_id").is_none());
}

#[test]
fn test_coordinates_forms() {
    let out = normalize_serve_attempts(&corpus());
    assert_eq!(out[7].coordinates.as_deref(), Some("-33.8688,151.2093"));
    assert_eq!(out[8].coordinates.as_deref(), Some("51.5074,-0.1278"));
    assert_eq!(out[8].attempt_number, 3);
}
