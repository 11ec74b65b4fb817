//! REST backend for an Appwrite-compatible document-store service.
//!
//! Implements [`DocumentStore`], [`BlobStore`] and [`FunctionRunner`] over a
//! single `reqwest` client. Every request carries the project header and, when
//! configured, the server API key.

use async_trait::async_trait;
use reqwest::{multipart, Client, Method, RequestBuilder, Response};
use serde_json::{json, Value as JsonValue};
use std::time::Duration;
use tracing::{debug, info, warn};

use servetrack_core::{
    BlobStore, DocumentList, DocumentStore, Error, FunctionExecution, FunctionRunner, Query,
    Result, StoredFile,
};

use crate::config::GatewayConfig;

/// HTTP backend for the remote service.
pub struct RestBackend {
    client: Client,
    config: GatewayConfig,
}

impl RestBackend {
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            endpoint = %config.endpoint,
            project_id = %config.project_id,
            database_id = %config.database_id,
            "Initializing REST document-store backend"
        );

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.config.endpoint.trim_end_matches('/'), path);
        let mut req = self
            .client
            .request(method, &url)
            .header("X-Appwrite-Project", &self.config.project_id);

        if let Some(ref api_key) = self.config.api_key {
            req = req.header("X-Appwrite-Key", api_key);
        }
        req
    }

    fn documents_path(&self, collection: &str) -> String {
        format!(
            "/databases/{}/collections/{}/documents",
            self.config.database_id, collection
        )
    }

    async fn send(&self, req: RequestBuilder) -> Result<Response> {
        let response = req.send().await.map_err(|e| {
            warn!(error = %e, "rest: request failed");
            Error::Request(e.to_string())
        })?;
        check_status(response).await
    }

    async fn send_json(&self, req: RequestBuilder) -> Result<JsonValue> {
        let response = self.send(req).await?;
        Ok(response.json::<JsonValue>().await?)
    }
}

/// Map non-success responses onto [`Error`], preferring the service's own
/// `message` field.
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<JsonValue>(&body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
        .unwrap_or(body);

    debug!(status = status.as_u16(), message = %message, "rest: non-success response");

    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(Error::NotFound(message));
    }
    Err(Error::Remote {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl DocumentStore for RestBackend {
    async fn list_documents(&self, collection: &str, queries: &[Query]) -> Result<DocumentList> {
        let params: Vec<(&str, String)> = queries.iter().map(|q| ("queries[]", q.to_wire())).collect();
        let req = self
            .request(Method::GET, &self.documents_path(collection))
            .query(&params);
        let response = self.send(req).await?;
        let list = response.json::<DocumentList>().await?;
        debug!(collection, total = list.total, returned = list.documents.len(), "rest: list_documents");
        Ok(list)
    }

    async fn get_document(&self, collection: &str, id: &str) -> Result<JsonValue> {
        let path = format!("{}/{}", self.documents_path(collection), id);
        self.send_json(self.request(Method::GET, &path)).await
    }

    async fn create_document(
        &self,
        collection: &str,
        id: &str,
        data: JsonValue,
    ) -> Result<JsonValue> {
        let req = self
            .request(Method::POST, &self.documents_path(collection))
            .json(&json!({ "documentId": id, "data": data }));
        self.send_json(req).await
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        data: JsonValue,
    ) -> Result<JsonValue> {
        let path = format!("{}/{}", self.documents_path(collection), id);
        let req = self
            .request(Method::PATCH, &path)
            .json(&json!({ "data": data }));
        self.send_json(req).await
    }

    async fn delete_document(&self, collection: &str, id: &str) -> Result<()> {
        let path = format!("{}/{}", self.documents_path(collection), id);
        self.send(self.request(Method::DELETE, &path)).await?;
        Ok(())
    }
}

#[async_trait]
impl BlobStore for RestBackend {
    async fn create_file(
        &self,
        bucket: &str,
        file_id: &str,
        file_name: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> Result<StoredFile> {
        let size = data.len() as u64;
        let part = multipart::Part::bytes(data)
            .file_name(file_name.to_string())
            .mime_str(content_type)?;
        let form = multipart::Form::new()
            .text("fileId", file_id.to_string())
            .part("file", part);

        let path = format!("/storage/buckets/{}/files", bucket);
        let stored = self
            .send_json(self.request(Method::POST, &path).multipart(form))
            .await?;

        Ok(StoredFile {
            id: stored
                .get("$id")
                .and_then(|v| v.as_str())
                .unwrap_or(file_id)
                .to_string(),
            name: stored
                .get("name")
                .and_then(|v| v.as_str())
                .unwrap_or(file_name)
                .to_string(),
            size: stored
                .get("sizeOriginal")
                .and_then(|v| v.as_u64())
                .unwrap_or(size),
            mime_type: stored
                .get("mimeType")
                .and_then(|v| v.as_str())
                .unwrap_or(content_type)
                .to_string(),
        })
    }

    async fn delete_file(&self, bucket: &str, file_id: &str) -> Result<()> {
        let path = format!("/storage/buckets/{}/files/{}", bucket, file_id);
        self.send(self.request(Method::DELETE, &path)).await?;
        Ok(())
    }
}

#[async_trait]
impl FunctionRunner for RestBackend {
    async fn execute(&self, function_id: &str, body: JsonValue) -> Result<FunctionExecution> {
        let path = format!("/functions/{}/executions", function_id);
        let req = self
            .request(Method::POST, &path)
            .json(&json!({ "body": body.to_string(), "async": false }));
        let execution = self.send_json(req).await?;

        Ok(FunctionExecution {
            status: execution
                .get("status")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown")
                .to_string(),
            response_status_code: execution
                .get("responseStatusCode")
                .and_then(|v| v.as_u64())
                .map(|c| c as u16)
                .unwrap_or(0),
            response_body: execution
                .get("responseBody")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
        })
    }
}
