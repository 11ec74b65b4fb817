//! Case operations.

use tracing::{info, warn};

use servetrack_core::{
    parse_all, parse_case, Case, CaseUpdate, ChangeKind, Collection, Error, NewCase, Query,
    Result,
};

use crate::gateway::Gateway;

fn case_not_found(id: &str, e: Error) -> Error {
    if e.is_not_found() {
        Error::NotFound(format!("Case {} not found", id))
    } else {
        e
    }
}

impl Gateway {
    pub async fn create_case(&self, req: NewCase) -> Result<Case> {
        req.validate()?;
        let id = Self::new_id();
        let stored = self
            .documents
            .create_document(
                self.collection_id(Collection::Cases),
                &id,
                serde_json::to_value(&req)?,
            )
            .await?;
        let case = parse_case(&stored)?;

        self.emit(Collection::Cases, ChangeKind::Created, &case.id);
        info!(case_id = %case.id, client_id = %case.client_id, "gateway: case created");
        Ok(case)
    }

    pub async fn get_case(&self, id: &str) -> Result<Case> {
        let raw = self
            .documents
            .get_document(self.collection_id(Collection::Cases), id)
            .await
            .map_err(|e| case_not_found(id, e))?;
        parse_case(&raw)
    }

    pub async fn try_list_cases(&self) -> Result<Vec<Case>> {
        let raw = self
            .fetch_all(Collection::Cases, vec![Query::order_desc("$createdAt")])
            .await?;
        Ok(parse_all(&raw, parse_case))
    }

    pub async fn list_cases(&self) -> Vec<Case> {
        self.try_list_cases().await.unwrap_or_else(|e| {
            warn!(error = %e, "gateway: listing cases failed, returning empty list");
            Vec::new()
        })
    }

    pub async fn try_list_cases_for_client(&self, client_id: &str) -> Result<Vec<Case>> {
        let raw = self
            .fetch_all(
                Collection::Cases,
                vec![
                    Query::equal("client_id", client_id),
                    Query::order_desc("$createdAt"),
                ],
            )
            .await?;
        Ok(parse_all(&raw, parse_case))
    }

    pub async fn list_cases_for_client(&self, client_id: &str) -> Vec<Case> {
        self.try_list_cases_for_client(client_id)
            .await
            .unwrap_or_else(|e| {
                warn!(client_id, error = %e, "gateway: listing client cases failed");
                Vec::new()
            })
    }

    pub async fn update_case(&self, id: &str, update: CaseUpdate) -> Result<Case> {
        let stored = self
            .documents
            .update_document(
                self.collection_id(Collection::Cases),
                id,
                serde_json::to_value(&update)?,
            )
            .await
            .map_err(|e| case_not_found(id, e))?;
        let case = parse_case(&stored)?;

        self.emit(Collection::Cases, ChangeKind::Updated, id);
        info!(case_id = id, "gateway: case updated");
        Ok(case)
    }

    pub async fn delete_case(&self, id: &str) -> Result<()> {
        self.documents
            .delete_document(self.collection_id(Collection::Cases), id)
            .await
            .map_err(|e| case_not_found(id, e))?;
        self.emit(Collection::Cases, ChangeKind::Deleted, id);
        info!(case_id = id, "gateway: case deleted");
        Ok(())
    }
}
