//! Uploaded documents: blob in the storage bucket plus a metadata record.

use serde_json::json;
use tracing::{error, info, warn};

use servetrack_core::{
    parse_all, parse_document, ChangeKind, Collection, Document, Error, NewDocument, Query,
    Result,
};

use crate::gateway::Gateway;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

impl Gateway {
    /// Upload the file, then record its metadata. If the metadata write fails
    /// the uploaded blob is removed again.
    pub async fn upload_document(&self, req: NewDocument) -> Result<Document> {
        req.validate()?;
        let bucket = &self.config.documents_bucket;
        let file_id = Self::new_id();
        let content_type = if req.file_type.trim().is_empty() {
            DEFAULT_CONTENT_TYPE.to_string()
        } else {
            req.file_type.clone()
        };

        let stored_file = self
            .blobs
            .create_file(bucket, &file_id, &req.file_name, &content_type, req.data)
            .await
            .map_err(|e| Error::Storage(format!("Upload of {} failed: {}", req.file_name, e)))?;

        let data = json!({
            "client_id": req.client_id,
            "case_number": req.case_number,
            "file_name": req.file_name,
            "file_size": stored_file.size,
            "file_type": content_type,
            "file_id": stored_file.id,
            "description": req.description,
        });

        let id = Self::new_id();
        let raw = match self
            .documents
            .create_document(self.collection_id(Collection::Documents), &id, data)
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                warn!(file_id = %stored_file.id, error = %e, "gateway: document metadata write failed, removing blob");
                if let Err(rollback) = self.blobs.delete_file(bucket, &stored_file.id).await {
                    error!(
                        file_id = %stored_file.id,
                        error = %rollback,
                        "gateway: orphaned blob left in storage"
                    );
                }
                return Err(e);
            }
        };
        let document = parse_document(&raw)?;

        self.emit(Collection::Documents, ChangeKind::Created, &document.id);
        info!(
            document_id = %document.id,
            client_id = %document.client_id,
            file_size = document.file_size,
            "gateway: document uploaded"
        );
        Ok(document)
    }

    pub async fn get_document(&self, id: &str) -> Result<Document> {
        let raw = self
            .documents
            .get_document(self.collection_id(Collection::Documents), id)
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    Error::NotFound(format!("Document {} not found", id))
                } else {
                    e
                }
            })?;
        parse_document(&raw)
    }

    /// Every document record, newest first.
    pub async fn try_list_documents(&self) -> Result<Vec<Document>> {
        let raw = self
            .fetch_all(Collection::Documents, vec![Query::order_desc("$createdAt")])
            .await?;
        Ok(parse_all(&raw, parse_document))
    }

    pub async fn try_list_documents_for_client(&self, client_id: &str) -> Result<Vec<Document>> {
        let raw = self
            .fetch_all(
                Collection::Documents,
                vec![
                    Query::equal("client_id", client_id),
                    Query::order_desc("$createdAt"),
                ],
            )
            .await?;
        Ok(parse_all(&raw, parse_document))
    }

    pub async fn list_documents_for_client(&self, client_id: &str) -> Vec<Document> {
        self.try_list_documents_for_client(client_id)
            .await
            .unwrap_or_else(|e| {
                warn!(client_id, error = %e, "gateway: listing client documents failed");
                Vec::new()
            })
    }

    /// Documents attached to one case of one client.
    pub async fn list_documents_for_case(
        &self,
        client_id: &str,
        case_number: &str,
    ) -> Vec<Document> {
        let queries = vec![
            Query::equal("client_id", client_id),
            Query::equal("case_number", case_number),
            Query::order_desc("$createdAt"),
        ];
        match self.fetch_all(Collection::Documents, queries).await {
            Ok(raw) => parse_all(&raw, parse_document),
            Err(e) => {
                warn!(client_id, case_number, error = %e, "gateway: listing case documents failed");
                Vec::new()
            }
        }
    }

    pub async fn delete_document(&self, id: &str) -> Result<()> {
        let document = self.get_document(id).await?;
        self.delete_document_record(&document).await
    }

    /// Remove the blob (when its reference is valid) and the metadata record.
    ///
    /// A blob that cannot be removed is logged and skipped; the metadata
    /// record is deleted either way.
    pub async fn delete_document_record(&self, document: &Document) -> Result<()> {
        if self.is_valid_file_ref(&document.file_id) {
            if let Err(e) = self
                .blobs
                .delete_file(&self.config.documents_bucket, &document.file_id)
                .await
            {
                warn!(
                    document_id = %document.id,
                    file_id = %document.file_id,
                    error = %e,
                    "gateway: blob delete failed, removing metadata anyway"
                );
            }
        } else {
            warn!(
                document_id = %document.id,
                file_id = %document.file_id,
                "gateway: invalid file reference, blob delete skipped"
            );
        }

        self.documents
            .delete_document(self.collection_id(Collection::Documents), &document.id)
            .await?;
        self.emit(Collection::Documents, ChangeKind::Deleted, &document.id);
        info!(document_id = %document.id, "gateway: document deleted");
        Ok(())
    }

    /// Direct view URL for a stored file.
    pub fn document_url(&self, document: &Document) -> String {
        format!(
            "{}/storage/buckets/{}/files/{}/view?project={}",
            self.config.endpoint.trim_end_matches('/'),
            self.config.documents_bucket,
            document.file_id,
            self.config.project_id
        )
    }
}
