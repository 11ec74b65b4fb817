//! In-memory backend for deterministic testing.
//!
//! [`MemoryStore`] implements every remote seam the gateway uses, records each
//! call, and can be told to fail specific operations.
//!
//! ```rust
//! use servetrack_gateway::memory::MemoryStore;
//! use serde_json::json;
//!
//! let store = MemoryStore::new();
//! store.seed("clients", json!({"$id": "c1", "name": "Acme"}));
//! store.fail_delete_of("s2");
//! assert!(store.contains("clients", "c1"));
//! ```

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value as JsonValue};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use servetrack_core::{
    BlobStore, DocumentList, DocumentStore, Error, FunctionExecution, FunctionRunner, Query,
    Result, StoredFile,
};

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    List { collection: String },
    Get { collection: String, id: String },
    Create { collection: String, id: String },
    Update { collection: String, id: String, data: JsonValue },
    Delete { collection: String, id: String },
    CreateFile { bucket: String, file_id: String },
    DeleteFile { bucket: String, file_id: String },
    Execute { function_id: String },
}

impl StoreCall {
    pub fn is_write(&self) -> bool {
        !matches!(self, Self::List { .. } | Self::Get { .. })
    }
}

#[derive(Default)]
struct Inner {
    collections: HashMap<String, Vec<JsonValue>>,
    files: HashMap<(String, String), StoredFile>,
    executions: Vec<JsonValue>,
    calls: Vec<StoreCall>,
    failing_deletes: HashSet<String>,
    failing_creates: HashSet<String>,
    fail_reads: bool,
    fail_functions: bool,
}

/// Mock document store, blob store and function runner.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

fn now_string() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn doc_id(doc: &JsonValue) -> Option<&str> {
    doc.get("$id")
        .or_else(|| doc.get("id"))
        .and_then(|v| v.as_str())
}

fn compare_values(a: Option<&JsonValue>, b: Option<&JsonValue>) -> Ordering {
    match (a, b) {
        (Some(JsonValue::Number(x)), Some(JsonValue::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(JsonValue::String(x)), Some(JsonValue::String(y))) => x.cmp(y),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        _ => Ordering::Equal,
    }
}

fn unavailable(operation: &str) -> Error {
    Error::Remote {
        status: 503,
        message: format!("simulated {} failure", operation),
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a raw document as-is. `$id` (or `id`) must be present.
    pub fn seed(&self, collection: &str, document: JsonValue) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .collections
            .entry(collection.to_string())
            .or_default()
            .push(document);
    }

    pub fn seed_file(&self, bucket: &str, file_id: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.files.insert(
            (bucket.to_string(), file_id.to_string()),
            StoredFile {
                id: file_id.to_string(),
                name: file_id.to_string(),
                size: 0,
                mime_type: "application/octet-stream".to_string(),
            },
        );
    }

    /// Make every delete of `id` (document or file) fail.
    pub fn fail_delete_of(&self, id: &str) {
        self.inner
            .lock()
            .unwrap()
            .failing_deletes
            .insert(id.to_string());
    }

    /// Make document creation in `collection` fail.
    pub fn fail_creates_in(&self, collection: &str) {
        self.inner
            .lock()
            .unwrap()
            .failing_creates
            .insert(collection.to_string());
    }

    /// Make list and get calls fail.
    pub fn fail_reads(&self, fail: bool) {
        self.inner.lock().unwrap().fail_reads = fail;
    }

    /// Make function executions fail.
    pub fn fail_functions(&self, fail: bool) {
        self.inner.lock().unwrap().fail_functions = fail;
    }

    pub fn documents(&self, collection: &str) -> Vec<JsonValue> {
        self.inner
            .lock()
            .unwrap()
            .collections
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    pub fn document(&self, collection: &str, id: &str) -> Option<JsonValue> {
        self.documents(collection)
            .into_iter()
            .find(|d| doc_id(d) == Some(id))
    }

    pub fn contains(&self, collection: &str, id: &str) -> bool {
        self.document(collection, id).is_some()
    }

    pub fn file_exists(&self, bucket: &str, file_id: &str) -> bool {
        self.inner
            .lock()
            .unwrap()
            .files
            .contains_key(&(bucket.to_string(), file_id.to_string()))
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn write_calls(&self) -> Vec<StoreCall> {
        self.calls().into_iter().filter(StoreCall::is_write).collect()
    }

    /// Bodies passed to successful function executions.
    pub fn executions(&self) -> Vec<JsonValue> {
        self.inner.lock().unwrap().executions.clone()
    }

    pub fn clear_calls(&self) {
        self.inner.lock().unwrap().calls.clear();
    }

    fn record(&self, call: StoreCall) {
        self.inner.lock().unwrap().calls.push(call);
    }
}

fn matches_query(doc: &JsonValue, queries: &[Query]) -> bool {
    queries.iter().all(|q| match q {
        Query::Equal { attribute, values } => doc
            .get(attribute)
            .map(|v| values.contains(v))
            .unwrap_or(false),
        _ => true,
    })
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn list_documents(&self, collection: &str, queries: &[Query]) -> Result<DocumentList> {
        self.record(StoreCall::List {
            collection: collection.to_string(),
        });
        let inner = self.inner.lock().unwrap();
        if inner.fail_reads {
            return Err(unavailable("list"));
        }

        let mut docs: Vec<JsonValue> = inner
            .collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|d| matches_query(d, queries))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        let total = docs.len() as u64;

        for q in queries {
            match q {
                Query::OrderDesc(attr) => {
                    docs.sort_by(|a, b| compare_values(b.get(attr), a.get(attr)))
                }
                Query::OrderAsc(attr) => {
                    docs.sort_by(|a, b| compare_values(a.get(attr), b.get(attr)))
                }
                _ => {}
            }
        }
        let offset = queries.iter().find_map(|q| match q {
            Query::Offset(n) => Some(*n as usize),
            _ => None,
        });
        let limit = queries.iter().find_map(|q| match q {
            Query::Limit(n) => Some(*n as usize),
            _ => None,
        });

        let documents = docs
            .into_iter()
            .skip(offset.unwrap_or(0))
            .take(limit.unwrap_or(usize::MAX))
            .collect();
        Ok(DocumentList { total, documents })
    }

    async fn get_document(&self, collection: &str, id: &str) -> Result<JsonValue> {
        self.record(StoreCall::Get {
            collection: collection.to_string(),
            id: id.to_string(),
        });
        if self.inner.lock().unwrap().fail_reads {
            return Err(unavailable("get"));
        }
        self.document(collection, id)
            .ok_or_else(|| Error::NotFound(format!("Document {} not found", id)))
    }

    async fn create_document(
        &self,
        collection: &str,
        id: &str,
        data: JsonValue,
    ) -> Result<JsonValue> {
        self.record(StoreCall::Create {
            collection: collection.to_string(),
            id: id.to_string(),
        });
        let mut inner = self.inner.lock().unwrap();
        if inner.failing_creates.contains(collection) {
            return Err(unavailable("create"));
        }

        let now = now_string();
        let mut doc = data;
        if let Some(obj) = doc.as_object_mut() {
            obj.insert("$id".to_string(), json!(id));
            obj.insert("$createdAt".to_string(), json!(now));
            obj.insert("$updatedAt".to_string(), json!(now));
        }
        inner
            .collections
            .entry(collection.to_string())
            .or_default()
            .push(doc.clone());
        Ok(doc)
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        data: JsonValue,
    ) -> Result<JsonValue> {
        self.record(StoreCall::Update {
            collection: collection.to_string(),
            id: id.to_string(),
            data: data.clone(),
        });
        let mut inner = self.inner.lock().unwrap();
        let doc = inner
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|d| doc_id(d) == Some(id)))
            .ok_or_else(|| Error::NotFound(format!("Document {} not found", id)))?;

        if let (Some(target), Some(patch)) = (doc.as_object_mut(), data.as_object()) {
            for (k, v) in patch {
                target.insert(k.clone(), v.clone());
            }
            target.insert("$updatedAt".to_string(), json!(now_string()));
        }
        Ok(doc.clone())
    }

    async fn delete_document(&self, collection: &str, id: &str) -> Result<()> {
        self.record(StoreCall::Delete {
            collection: collection.to_string(),
            id: id.to_string(),
        });
        let mut inner = self.inner.lock().unwrap();
        if inner.failing_deletes.contains(id) {
            return Err(unavailable("delete"));
        }
        let docs = inner
            .collections
            .get_mut(collection)
            .ok_or_else(|| Error::NotFound(format!("Document {} not found", id)))?;
        let before = docs.len();
        docs.retain(|d| doc_id(d) != Some(id));
        if docs.len() == before {
            return Err(Error::NotFound(format!("Document {} not found", id)));
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn create_file(
        &self,
        bucket: &str,
        file_id: &str,
        file_name: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> Result<StoredFile> {
        self.record(StoreCall::CreateFile {
            bucket: bucket.to_string(),
            file_id: file_id.to_string(),
        });
        let stored = StoredFile {
            id: file_id.to_string(),
            name: file_name.to_string(),
            size: data.len() as u64,
            mime_type: content_type.to_string(),
        };
        self.inner
            .lock()
            .unwrap()
            .files
            .insert((bucket.to_string(), file_id.to_string()), stored.clone());
        Ok(stored)
    }

    async fn delete_file(&self, bucket: &str, file_id: &str) -> Result<()> {
        self.record(StoreCall::DeleteFile {
            bucket: bucket.to_string(),
            file_id: file_id.to_string(),
        });
        let mut inner = self.inner.lock().unwrap();
        if inner.failing_deletes.contains(file_id) {
            return Err(unavailable("file delete"));
        }
        inner
            .files
            .remove(&(bucket.to_string(), file_id.to_string()))
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(format!("File {} not found", file_id)))
    }
}

#[async_trait]
impl FunctionRunner for MemoryStore {
    async fn execute(&self, function_id: &str, body: JsonValue) -> Result<FunctionExecution> {
        self.record(StoreCall::Execute {
            function_id: function_id.to_string(),
        });
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_functions {
            return Err(unavailable("function"));
        }
        inner.executions.push(body);
        Ok(FunctionExecution {
            status: "completed".to_string(),
            response_status_code: 200,
            response_body: r#"{"success":true}"#.to_string(),
        })
    }
}
