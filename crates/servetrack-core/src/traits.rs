//! Core traits for the remote service seams.
//!
//! The gateway talks to the document store, the storage bucket and the
//! function endpoint only through these traits, so the REST backend and the
//! in-memory test backend are interchangeable.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::Result;
use crate::query::Query;

/// One page of raw documents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentList {
    pub total: u64,
    pub documents: Vec<JsonValue>,
}

/// Document collections keyed by collection identifier.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn list_documents(&self, collection: &str, queries: &[Query]) -> Result<DocumentList>;

    async fn get_document(&self, collection: &str, id: &str) -> Result<JsonValue>;

    /// Create a document with the given id; returns the stored document.
    async fn create_document(&self, collection: &str, id: &str, data: JsonValue)
        -> Result<JsonValue>;

    /// Patch the given fields; returns the stored document.
    async fn update_document(&self, collection: &str, id: &str, data: JsonValue)
        -> Result<JsonValue>;

    async fn delete_document(&self, collection: &str, id: &str) -> Result<()>;
}

/// Metadata returned after a file upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredFile {
    pub id: String,
    pub name: String,
    pub size: u64,
    pub mime_type: String,
}

/// Blob storage buckets.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn create_file(
        &self,
        bucket: &str,
        file_id: &str,
        file_name: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> Result<StoredFile>;

    async fn delete_file(&self, bucket: &str, file_id: &str) -> Result<()>;
}

/// Result of a managed function execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionExecution {
    pub status: String,
    pub response_status_code: u16,
    pub response_body: String,
}

impl FunctionExecution {
    pub fn succeeded(&self) -> bool {
        self.status != "failed" && self.response_status_code < 400
    }
}

/// Managed function endpoint (used for email delivery).
#[async_trait]
pub trait FunctionRunner: Send + Sync {
    async fn execute(&self, function_id: &str, body: JsonValue) -> Result<FunctionExecution>;
}
