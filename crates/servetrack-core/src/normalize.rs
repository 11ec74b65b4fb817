//! Parsing of raw store documents into canonical records.
//!
//! Documents arrive from the remote store, from the local cache, or from older
//! app versions with inconsistent key casing (`client_id` vs `clientId`),
//! store metadata keys (`$id`, `$createdAt`), and optional fields that may be
//! missing or `null`. Everything is funneled through this module so call
//! sites only ever see the canonical types from [`crate::models`].
//!
//! Serve attempt normalization never drops a record: every canonical field is
//! populated, falling back to its documented default. Normalizing an already
//! canonical record is a no-op.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Value as JsonValue};
use tracing::warn;

use crate::defaults;
use crate::error::{Error, Result};
use crate::models::{Case, Client, Document, ServeAttempt, ServeStatus};

/// Key lookup over a raw document, first match wins.
struct Fields<'a> {
    obj: Option<&'a Map<String, JsonValue>>,
}

impl<'a> Fields<'a> {
    fn new(raw: &'a JsonValue) -> Self {
        Self {
            obj: raw.as_object(),
        }
    }

    fn get(&self, keys: &[&str]) -> Option<&'a JsonValue> {
        let obj = self.obj?;
        keys.iter()
            .filter_map(|k| obj.get(*k))
            .find(|v| !v.is_null())
    }

    /// String value, with numbers and booleans rendered as text. Blank
    /// strings count as missing.
    fn text(&self, keys: &[&str]) -> Option<String> {
        let obj = self.obj?;
        keys.iter().filter_map(|k| obj.get(*k)).find_map(|v| match v {
            JsonValue::String(s) if !s.trim().is_empty() => Some(s.clone()),
            JsonValue::Number(n) => Some(n.to_string()),
            JsonValue::Bool(b) => Some(b.to_string()),
            _ => None,
        })
    }

    fn text_or(&self, keys: &[&str], default: &str) -> String {
        self.text(keys).unwrap_or_else(|| default.to_string())
    }

    fn strings(&self, keys: &[&str]) -> Vec<String> {
        match self.get(keys) {
            Some(JsonValue::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            Some(JsonValue::String(s)) => s
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }

    fn uint(&self, keys: &[&str]) -> Option<u64> {
        match self.get(keys)? {
            JsonValue::Number(n) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
            JsonValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn timestamp(&self, keys: &[&str]) -> Option<DateTime<Utc>> {
        self.get(keys).and_then(coerce_timestamp)
    }
}

const ID_KEYS: &[&str] = &["id", "$id"];
const CLIENT_ID_KEYS: &[&str] = &["clientId", "client_id"];
const CREATED_KEYS: &[&str] = &["createdAt", "created_at", "$createdAt"];
const UPDATED_KEYS: &[&str] = &["updatedAt", "updated_at", "$updatedAt"];

/// Convert a date-like value into a UTC timestamp.
///
/// Accepts RFC 3339 strings, `YYYY-MM-DD HH:MM:SS` / `YYYY-MM-DD` strings,
/// epoch milliseconds (number or digit string), and serialized date objects
/// (`{"seconds": .., "nanoseconds": ..}` or `{"$date": ..}`).
pub fn coerce_timestamp(raw: &JsonValue) -> Option<DateTime<Utc>> {
    match raw {
        JsonValue::String(s) => parse_date_str(s.trim()),
        JsonValue::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(DateTime::<Utc>::from_timestamp_millis),
        JsonValue::Object(obj) => {
            if let Some(inner) = obj.get("$date") {
                return coerce_timestamp(inner);
            }
            let secs = obj
                .get("seconds")
                .or_else(|| obj.get("_seconds"))
                .and_then(JsonValue::as_i64)?;
            let nanos = obj
                .get("nanoseconds")
                .or_else(|| obj.get("_nanoseconds"))
                .and_then(JsonValue::as_u64)
                .unwrap_or(0);
            DateTime::<Utc>::from_timestamp(secs, nanos as u32)
        }
        _ => None,
    }
}

fn parse_date_str(s: &str) -> Option<DateTime<Utc>> {
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|n| n.and_utc());
    }
    if s.bytes().all(|b| b.is_ascii_digit()) {
        return s.parse().ok().and_then(DateTime::<Utc>::from_timestamp_millis);
    }
    None
}

/// Canonical `"lat,long"` form of a coordinate value.
///
/// Strings pass through unchanged; `{latitude, longitude}` (or `lat`/`lng`)
/// objects are formatted. Anything else yields `None`.
pub fn normalize_coordinates(raw: &JsonValue) -> Option<String> {
    match raw {
        JsonValue::String(s) if !s.trim().is_empty() => Some(s.clone()),
        JsonValue::Object(_) => {
            let fields = Fields::new(raw);
            let lat = coordinate_part(fields.get(&["latitude", "lat"])?)?;
            let lon = coordinate_part(fields.get(&["longitude", "lng", "lon"])?)?;
            Some(format!("{},{}", lat, lon))
        }
        _ => None,
    }
}

fn coordinate_part(v: &JsonValue) -> Option<f64> {
    match v {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Normalize one raw serve attempt.
pub fn normalize_serve_attempt(raw: &JsonValue) -> ServeAttempt {
    let f = Fields::new(raw);
    let id = f.text_or(ID_KEYS, "");

    let timestamp = match f.timestamp(&["timestamp"]) {
        Some(ts) => ts,
        None => {
            let fallback = f.timestamp(CREATED_KEYS);
            warn!(
                serve_id = %id,
                raw_timestamp = ?f.get(&["timestamp"]),
                used_created_at = fallback.is_some(),
                "normalize: unusable serve attempt timestamp, applying fallback"
            );
            fallback.unwrap_or_default()
        }
    };

    let attempt_number = f
        .uint(&["attemptNumber", "attempt_number"])
        .filter(|n| *n >= 1)
        .map(|n| n.min(u32::MAX as u64) as u32)
        .unwrap_or(defaults::ATTEMPT_NUMBER);

    ServeAttempt {
        id,
        client_id: f.text_or(CLIENT_ID_KEYS, ""),
        client_name: f.text_or(&["clientName", "client_name"], defaults::UNKNOWN_CLIENT),
        case_number: f.text_or(&["caseNumber", "case_number"], defaults::UNKNOWN),
        case_name: f.text_or(&["caseName", "case_name"], defaults::UNKNOWN),
        status: f
            .text(&["status"])
            .map(|s| ServeStatus::parse_lenient(&s))
            .unwrap_or_default(),
        notes: f.text_or(&["notes"], ""),
        address: f.text_or(&["address"], ""),
        coordinates: f.get(&["coordinates"]).and_then(normalize_coordinates),
        image_data: f.text(&["imageData", "image_data"]),
        timestamp,
        attempt_number,
    }
}

/// Normalize a batch of raw serve attempts, preserving order.
pub fn normalize_serve_attempts(raw: &[JsonValue]) -> Vec<ServeAttempt> {
    raw.iter().map(normalize_serve_attempt).collect()
}

fn require_id(f: &Fields<'_>, entity: &str) -> Result<String> {
    f.text(ID_KEYS)
        .ok_or_else(|| Error::Serialization(format!("{} document has no id", entity)))
}

/// Parse a raw client document.
pub fn parse_client(raw: &JsonValue) -> Result<Client> {
    let f = Fields::new(raw);
    Ok(Client {
        id: require_id(&f, "client")?,
        name: f.text_or(&["name"], ""),
        email: f.text_or(&["email"], ""),
        additional_emails: f.strings(&["additionalEmails", "additional_emails"]),
        phone: f.text_or(&["phone"], ""),
        address: f.text_or(&["address"], ""),
        notes: f.text_or(&["notes"], ""),
    })
}

/// Parse a raw case document.
pub fn parse_case(raw: &JsonValue) -> Result<Case> {
    let f = Fields::new(raw);
    Ok(Case {
        id: require_id(&f, "case")?,
        client_id: f.text_or(CLIENT_ID_KEYS, ""),
        case_number: f.text_or(&["caseNumber", "case_number"], ""),
        case_name: f.text_or(&["caseName", "case_name"], ""),
        description: f.text_or(&["description"], ""),
        status: f.text_or(&["status"], ""),
        home_address: f.text_or(&["homeAddress", "home_address"], ""),
        work_address: f.text_or(&["workAddress", "work_address"], ""),
        created_at: f.timestamp(CREATED_KEYS),
        updated_at: f.timestamp(UPDATED_KEYS),
    })
}

/// Parse a raw document metadata record.
pub fn parse_document(raw: &JsonValue) -> Result<Document> {
    let f = Fields::new(raw);
    Ok(Document {
        id: require_id(&f, "document")?,
        client_id: f.text_or(CLIENT_ID_KEYS, ""),
        case_number: f.text(&["caseNumber", "case_number"]),
        file_name: f.text_or(&["fileName", "file_name"], ""),
        file_size: f.uint(&["fileSize", "file_size"]).unwrap_or(0),
        file_type: f.text_or(&["fileType", "file_type"], ""),
        file_id: f.text_or(&["fileId", "file_id"], ""),
        description: f.text_or(&["description"], ""),
        created_at: f.timestamp(CREATED_KEYS),
    })
}

/// Parse a batch of documents, skipping (and logging) unparseable entries.
pub fn parse_all<T>(raw: &[JsonValue], parse: fn(&JsonValue) -> Result<T>) -> Vec<T> {
    raw.iter()
        .filter_map(|doc| match parse(doc) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(error = %e, "normalize: skipping malformed document");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_snake_and_camel_keys_map_to_same_record() {
        let snake = json!({
            "$id": "s1",
            "client_id": "c1",
            "client_name": "Acme",
            "case_number": "CV-1",
            "case_name": "Acme v. Doe",
            "status": "completed",
            "image_data": "data:image/jpeg;base64,AAA",
            "attempt_number": 2,
            "timestamp": "2024-05-01T12:00:00Z"
        });
        let camel = json!({
            "id": "s1",
            "clientId": "c1",
            "clientName": "Acme",
            "caseNumber": "CV-1",
            "caseName": "Acme v. Doe",
            "status": "completed",
            "imageData": "data:image/jpeg;base64,AAA",
            "attemptNumber": 2,
            "timestamp": "2024-05-01T12:00:00Z"
        });
        assert_eq!(
            normalize_serve_attempt(&snake),
            normalize_serve_attempt(&camel)
        );
    }

    #[test]
    fn test_missing_fields_get_defaults() {
        let record = normalize_serve_attempt(&json!({"$id": "s2"}));
        assert_eq!(record.id, "s2");
        assert_eq!(record.client_id, "");
        assert_eq!(record.client_name, defaults::UNKNOWN_CLIENT);
        assert_eq!(record.case_number, "unknown");
        assert_eq!(record.case_name, "unknown");
        assert_eq!(record.status, ServeStatus::Unknown);
        assert_eq!(record.notes, "");
        assert_eq!(record.address, "");
        assert_eq!(record.coordinates, None);
        assert_eq!(record.image_data, None);
        assert_eq!(record.attempt_number, 1);
        assert_eq!(record.timestamp, DateTime::<Utc>::default());
    }

    #[test]
    fn test_null_fields_get_defaults() {
        let record = normalize_serve_attempt(&json!({
            "$id": "s3",
            "notes": null,
            "coordinates": null,
            "image_data": null,
            "attempt_number": null,
            "status": null
        }));
        assert_eq!(record.notes, "");
        assert_eq!(record.coordinates, None);
        assert_eq!(record.image_data, None);
        assert_eq!(record.attempt_number, 1);
        assert_eq!(record.status, ServeStatus::Unknown);
    }

    #[test]
    fn test_non_object_record_is_kept_with_defaults() {
        let out = normalize_serve_attempts(&[json!("garbage"), json!(42)]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].status, ServeStatus::Unknown);
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let raw = json!({
            "$id": "s4",
            "client_id": "c9",
            "status": "Failed",
            "coordinates": {"latitude": 12.34, "longitude": 56.78},
            "timestamp": "2024-01-02 03:04:05",
            "attempt_number": "3",
            "notes": "Dog in yard"
        });
        let once = normalize_serve_attempt(&raw);
        let twice = normalize_serve_attempt(&serde_json::to_value(&once).unwrap());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_idempotent_for_record_with_bad_timestamp() {
        let once = normalize_serve_attempt(&json!({"$id": "s5", "timestamp": "not a date"}));
        let twice = normalize_serve_attempt(&serde_json::to_value(&once).unwrap());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_bad_timestamp_falls_back_to_created_at() {
        let record = normalize_serve_attempt(&json!({
            "$id": "s6",
            "timestamp": "yesterday-ish",
            "$createdAt": "2024-02-03T04:05:06.000+00:00"
        }));
        assert_eq!(
            record.timestamp,
            Utc.with_ymd_and_hms(2024, 2, 3, 4, 5, 6).unwrap()
        );
    }

    #[test]
    fn test_coerce_timestamp_representations() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(
            coerce_timestamp(&json!("2024-01-01T00:00:00Z")),
            Some(expected)
        );
        assert_eq!(coerce_timestamp(&json!("2024-01-01")), Some(expected));
        assert_eq!(
            coerce_timestamp(&json!(expected.timestamp_millis())),
            Some(expected)
        );
        assert_eq!(
            coerce_timestamp(&json!({"seconds": expected.timestamp(), "nanoseconds": 0})),
            Some(expected)
        );
        assert_eq!(
            coerce_timestamp(&json!({"$date": "2024-01-01T00:00:00Z"})),
            Some(expected)
        );
        assert_eq!(coerce_timestamp(&json!(true)), None);
        assert_eq!(coerce_timestamp(&json!("")), None);
    }

    #[test]
    fn test_structured_coordinates_normalize_to_string() {
        assert_eq!(
            normalize_coordinates(&json!({"latitude": 12.34, "longitude": 56.78})),
            Some("12.34,56.78".to_string())
        );
        assert_eq!(
            normalize_coordinates(&json!({"lat": "1.5", "lng": "-2.25"})),
            Some("1.5,-2.25".to_string())
        );
    }

    #[test]
    fn test_string_coordinates_pass_through() {
        assert_eq!(
            normalize_coordinates(&json!("40.7128, -74.0060")),
            Some("40.7128, -74.0060".to_string())
        );
        assert_eq!(normalize_coordinates(&json!({"latitude": 1.0})), None);
        assert_eq!(normalize_coordinates(&json!(12)), None);
    }

    #[test]
    fn test_attempt_number_must_be_positive() {
        let zero = normalize_serve_attempt(&json!({"attemptNumber": 0}));
        assert_eq!(zero.attempt_number, 1);
        let neg = normalize_serve_attempt(&json!({"attemptNumber": -4}));
        assert_eq!(neg.attempt_number, 1);
    }

    #[test]
    fn test_parse_client_from_store_document() {
        let client = parse_client(&json!({
            "$id": "c1",
            "$createdAt": "2024-01-01T00:00:00.000+00:00",
            "name": "Acme Corp",
            "email": "legal@acme.test",
            "additional_emails": ["ops@acme.test"],
            "phone": null
        }))
        .unwrap();
        assert_eq!(client.id, "c1");
        assert_eq!(client.additional_emails, vec!["ops@acme.test"]);
        assert_eq!(client.phone, "");
    }

    #[test]
    fn test_parse_client_round_trips_canonical_shape() {
        let client = parse_client(&json!({"$id": "c2", "name": "Beta"})).unwrap();
        let again = parse_client(&serde_json::to_value(&client).unwrap()).unwrap();
        assert_eq!(client, again);
    }

    #[test]
    fn test_parse_client_without_id_fails() {
        let err = parse_client(&json!({"name": "No Id"})).unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_parse_document_prefers_attribute_over_store_metadata() {
        let doc = parse_document(&json!({
            "$id": "d1",
            "client_id": "c1",
            "file_name": "affidavit.pdf",
            "file_size": 2048,
            "file_type": "application/pdf",
            "file_id": "file_abc",
            "created_at": "2024-06-01T00:00:00Z",
            "$createdAt": "2024-06-02T00:00:00.000+00:00"
        }))
        .unwrap();
        assert_eq!(doc.file_size, 2048);
        assert_eq!(doc.case_number, None);
        assert_eq!(
            doc.created_at,
            Some(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_parse_all_skips_malformed() {
        let cases = parse_all(
            &[
                json!({"$id": "k1", "client_id": "c1", "case_number": "CV-1"}),
                json!({"client_id": "c1"}),
            ],
            parse_case,
        );
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].case_number, "CV-1");
    }
}
