//! Client operations, including the cascading delete.

use serde::Serialize;
use tracing::{debug, info, warn};

use servetrack_core::{
    parse_all, parse_client, ChangeKind, Client, ClientUpdate, Collection, Error, NewClient,
    Query, Result,
};

use crate::gateway::Gateway;

/// One owned record that could not be removed during a cascade.
#[derive(Debug, Clone, Serialize)]
pub struct CascadeFailure {
    pub collection: Collection,
    /// `None` when the owned records could not even be listed.
    pub document_id: Option<String>,
    pub error: String,
}

/// What a client delete removed along the way.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CascadeReport {
    pub client_id: String,
    pub cases_deleted: usize,
    pub serve_attempts_deleted: usize,
    pub documents_deleted: usize,
    pub failures: Vec<CascadeFailure>,
}

impl CascadeReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    fn count_for(&mut self, collection: Collection) -> &mut usize {
        match collection {
            Collection::Cases => &mut self.cases_deleted,
            Collection::ServeAttempts => &mut self.serve_attempts_deleted,
            _ => &mut self.documents_deleted,
        }
    }
}

impl Gateway {
    pub async fn create_client(&self, req: NewClient) -> Result<Client> {
        req.validate()?;
        let id = Self::new_id();
        let stored = self
            .documents
            .create_document(
                self.collection_id(Collection::Clients),
                &id,
                serde_json::to_value(&req)?,
            )
            .await?;
        let client = parse_client(&stored)?;

        self.emit(Collection::Clients, ChangeKind::Created, &client.id);
        info!(client_id = %client.id, "gateway: client created");
        Ok(client)
    }

    pub async fn get_client(&self, id: &str) -> Result<Client> {
        let raw = self
            .documents
            .get_document(self.collection_id(Collection::Clients), id)
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    Error::ClientNotFound(id.to_string())
                } else {
                    e
                }
            })?;
        parse_client(&raw)
    }

    /// All clients ordered by name.
    pub async fn try_list_clients(&self) -> Result<Vec<Client>> {
        let raw = self
            .fetch_all(Collection::Clients, vec![Query::order_asc("name")])
            .await?;
        Ok(parse_all(&raw, parse_client))
    }

    /// Like [`Gateway::try_list_clients`], degrading to an empty list.
    pub async fn list_clients(&self) -> Vec<Client> {
        self.try_list_clients().await.unwrap_or_else(|e| {
            warn!(error = %e, "gateway: listing clients failed, returning empty list");
            Vec::new()
        })
    }

    pub async fn update_client(&self, id: &str, update: ClientUpdate) -> Result<Client> {
        if update.is_empty() {
            debug!(client_id = id, "gateway: empty client update, nothing written");
            return self.get_client(id).await;
        }
        let stored = self
            .documents
            .update_document(
                self.collection_id(Collection::Clients),
                id,
                serde_json::to_value(&update)?,
            )
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    Error::ClientNotFound(id.to_string())
                } else {
                    e
                }
            })?;
        let client = parse_client(&stored)?;

        self.emit(Collection::Clients, ChangeKind::Updated, id);
        info!(client_id = id, "gateway: client updated");
        Ok(client)
    }

    /// Delete a client and everything it owns.
    ///
    /// Cases, then serve attempts, then documents are removed one at a time.
    /// A failed item is logged and recorded in the report; the cascade keeps
    /// going and the client record is deleted last regardless. Only the
    /// final client delete can fail the call.
    pub async fn delete_client(&self, id: &str) -> Result<CascadeReport> {
        let mut report = CascadeReport {
            client_id: id.to_string(),
            ..Default::default()
        };

        for collection in [Collection::Cases, Collection::ServeAttempts] {
            let ids = match self.owned_ids(collection, id).await {
                Ok(ids) => ids,
                Err(e) => {
                    warn!(
                        client_id = id,
                        collection = collection.as_str(),
                        error = %e,
                        "gateway: cascade listing failed"
                    );
                    report.failures.push(CascadeFailure {
                        collection,
                        document_id: None,
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            for doc_id in ids {
                match self
                    .documents
                    .delete_document(self.collection_id(collection), &doc_id)
                    .await
                {
                    Ok(()) => {
                        *report.count_for(collection) += 1;
                        self.emit(collection, ChangeKind::Deleted, &doc_id);
                    }
                    Err(e) => {
                        warn!(
                            client_id = id,
                            collection = collection.as_str(),
                            document_id = %doc_id,
                            error = %e,
                            "gateway: cascade delete failed, continuing"
                        );
                        report.failures.push(CascadeFailure {
                            collection,
                            document_id: Some(doc_id),
                            error: e.to_string(),
                        });
                    }
                }
            }
        }

        match self.try_list_documents_for_client(id).await {
            Ok(docs) => {
                for doc in docs {
                    match self.delete_document_record(&doc).await {
                        Ok(()) => report.documents_deleted += 1,
                        Err(e) => {
                            warn!(
                                client_id = id,
                                document_id = %doc.id,
                                error = %e,
                                "gateway: cascade delete failed, continuing"
                            );
                            report.failures.push(CascadeFailure {
                                collection: Collection::Documents,
                                document_id: Some(doc.id),
                                error: e.to_string(),
                            });
                        }
                    }
                }
            }
            Err(e) => {
                warn!(client_id = id, error = %e, "gateway: cascade listing failed");
                report.failures.push(CascadeFailure {
                    collection: Collection::Documents,
                    document_id: None,
                    error: e.to_string(),
                });
            }
        }

        self.documents
            .delete_document(self.collection_id(Collection::Clients), id)
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    Error::ClientNotFound(id.to_string())
                } else {
                    e
                }
            })?;
        self.emit(Collection::Clients, ChangeKind::Deleted, id);

        info!(
            client_id = id,
            cases_deleted = report.cases_deleted,
            serve_attempts_deleted = report.serve_attempts_deleted,
            documents_deleted = report.documents_deleted,
            failures = report.failures.len(),
            "gateway: client deleted"
        );
        Ok(report)
    }
}
