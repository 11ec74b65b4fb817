//! Serve attempt operations.

use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value as JsonValue};
use tracing::{debug, info, warn};

use servetrack_core::{
    defaults, normalize_serve_attempt, normalize_serve_attempts, ChangeKind, Collection, Error,
    NewServeAttempt, Query, Result, ServeAttempt, ServeAttemptUpdate,
};

use crate::gateway::{Gateway, Mutation};
use crate::notify::{serve_created_email, serve_updated_email};

/// Apply the image retention policy to one listed page.
///
/// Pages fetched at a non-zero offset lose every image. The first page keeps
/// images only for its first [`defaults::IMAGE_WINDOW`] records.
pub fn apply_image_window(records: &mut [ServeAttempt], offset: u32) {
    let keep = if offset > 0 { 0 } else { defaults::IMAGE_WINDOW };
    for record in records.iter_mut().skip(keep) {
        record.strip_image();
    }
}

impl Gateway {
    /// Record a serve attempt and queue the notification email.
    ///
    /// The client name is looked up when not supplied; a failed lookup falls
    /// back to "Unknown Client" rather than aborting.
    pub async fn create_serve_attempt(
        &self,
        req: NewServeAttempt,
    ) -> Result<Mutation<ServeAttempt>> {
        req.validate()?;

        let client = match self.get_client(&req.client_id).await {
            Ok(client) => Some(client),
            Err(e) => {
                warn!(
                    client_id = %req.client_id,
                    error = %e,
                    "gateway: client lookup for serve attempt failed"
                );
                None
            }
        };
        let client_name = req
            .client_name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .or_else(|| client.as_ref().map(|c| c.name.clone()))
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| defaults::UNKNOWN_CLIENT.to_string());

        let non_blank = |v: &Option<String>| {
            v.clone()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| defaults::UNKNOWN.to_string())
        };
        let timestamp = req.timestamp.unwrap_or_else(Utc::now);
        let data = json!({
            "client_id": req.client_id,
            "client_name": client_name,
            "case_number": non_blank(&req.case_number),
            "case_name": non_blank(&req.case_name),
            "status": req.status.as_str(),
            "notes": req.notes,
            "address": req.address,
            "coordinates": req.coordinates.as_ref().map(|c| c.to_canonical()),
            "image_data": req.image_data,
            "timestamp": timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            "attempt_number": req.attempt_number.filter(|n| *n >= 1).unwrap_or(defaults::ATTEMPT_NUMBER),
        });

        let id = Self::new_id();
        let stored = self
            .documents
            .create_document(self.collection_id(Collection::ServeAttempts), &id, data)
            .await?;
        let serve = normalize_serve_attempt(&stored);

        self.emit(Collection::ServeAttempts, ChangeKind::Created, &serve.id);
        info!(
            serve_id = %serve.id,
            client_id = %serve.client_id,
            status = %serve.status,
            has_image = serve.has_image(),
            "gateway: serve attempt created"
        );

        let recipients = client.map(|c| c.recipients()).unwrap_or_default();
        let ticket = self.notifier.send(serve_created_email(&serve, recipients));
        Ok(Mutation::with_notification(serve, ticket))
    }

    pub async fn get_serve_attempt(&self, id: &str) -> Result<ServeAttempt> {
        let raw = self
            .documents
            .get_document(self.collection_id(Collection::ServeAttempts), id)
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    Error::ServeAttemptNotFound(id.to_string())
                } else {
                    e
                }
            })?;
        Ok(normalize_serve_attempt(&raw))
    }

    /// One page of serve attempts, newest first, with the image policy
    /// applied.
    pub async fn try_list_serve_attempts(
        &self,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<ServeAttempt>> {
        let queries = vec![
            Query::order_desc("timestamp"),
            Query::limit(limit),
            Query::offset(offset),
        ];
        let raw = self.fetch_all(Collection::ServeAttempts, queries).await?;
        let mut records = normalize_serve_attempts(&raw);
        records.truncate(limit as usize);
        apply_image_window(&mut records, offset);
        debug!(limit, offset, returned = records.len(), "gateway: listed serve attempts");
        Ok(records)
    }

    /// Like [`Gateway::try_list_serve_attempts`], degrading to an empty page.
    pub async fn list_serve_attempts(&self, limit: u32, offset: u32) -> Vec<ServeAttempt> {
        self.try_list_serve_attempts(limit, offset)
            .await
            .unwrap_or_else(|e| {
                warn!(limit, offset, error = %e, "gateway: listing serve attempts failed, returning empty page");
                Vec::new()
            })
    }

    /// Every serve attempt for one client, newest first, images stripped
    /// past the first [`defaults::IMAGE_WINDOW`].
    pub async fn try_list_serve_attempts_for_client(
        &self,
        client_id: &str,
    ) -> Result<Vec<ServeAttempt>> {
        let raw = self
            .fetch_all(
                Collection::ServeAttempts,
                vec![
                    Query::equal("client_id", client_id),
                    Query::order_desc("timestamp"),
                ],
            )
            .await?;
        let mut records = normalize_serve_attempts(&raw);
        apply_image_window(&mut records, 0);
        Ok(records)
    }

    pub async fn list_serve_attempts_for_client(&self, client_id: &str) -> Vec<ServeAttempt> {
        self.try_list_serve_attempts_for_client(client_id)
            .await
            .unwrap_or_else(|e| {
                warn!(client_id, error = %e, "gateway: listing client serve attempts failed");
                Vec::new()
            })
    }

    /// Write the mutable fields that changed.
    ///
    /// An update identical to the stored record writes nothing and returns
    /// the stored record. Otherwise the change is published on the feed
    /// (which drives the cache resync) and the owning client is emailed.
    pub async fn update_serve_attempt(
        &self,
        id: &str,
        update: ServeAttemptUpdate,
    ) -> Result<Mutation<ServeAttempt>> {
        let stored = self.get_serve_attempt(id).await?;
        let changes = update.changes_from(&stored);
        if changes.is_empty() {
            debug!(serve_id = id, "gateway: serve attempt unchanged, nothing written");
            return Ok(Mutation::new(stored));
        }

        let changed: Vec<String> = changes.keys().cloned().collect();
        let raw = self
            .documents
            .update_document(
                self.collection_id(Collection::ServeAttempts),
                id,
                JsonValue::Object(changes),
            )
            .await?;
        let serve = normalize_serve_attempt(&raw);

        self.emit(Collection::ServeAttempts, ChangeKind::Updated, id);
        info!(serve_id = id, fields = ?changed, "gateway: serve attempt updated");

        let ticket = match self.get_client(&serve.client_id).await {
            Ok(client) => Some(self.notifier.send(serve_updated_email(&serve, &client))),
            Err(e) => {
                warn!(
                    serve_id = id,
                    client_id = %serve.client_id,
                    error = %e,
                    "gateway: owner lookup failed, update notification skipped"
                );
                None
            }
        };

        Ok(Mutation {
            record: serve,
            notification: ticket,
        })
    }

    pub async fn delete_serve_attempt(&self, id: &str) -> Result<()> {
        self.documents
            .delete_document(self.collection_id(Collection::ServeAttempts), id)
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    Error::ServeAttemptNotFound(id.to_string())
                } else {
                    e
                }
            })?;
        self.emit(Collection::ServeAttempts, ChangeKind::Deleted, id);
        info!(serve_id = id, "gateway: serve attempt deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use servetrack_core::ServeStatus;

    fn record(i: usize) -> ServeAttempt {
        ServeAttempt {
            id: format!("s{}", i),
            client_id: "c1".to_string(),
            client_name: "Acme".to_string(),
            case_number: "CV-1".to_string(),
            case_name: "Acme v. Doe".to_string(),
            status: ServeStatus::Failed,
            notes: String::new(),
            address: String::new(),
            coordinates: None,
            image_data: Some("data:image/png;base64,AAAA".to_string()),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            attempt_number: 1,
        }
    }

    #[test]
    fn test_image_window_first_page() {
        let mut records: Vec<_> = (0..25).map(record).collect();
        apply_image_window(&mut records, 0);
        assert!(records[..20].iter().all(|r| r.has_image()));
        assert!(records[20..].iter().all(|r| !r.has_image()));
    }

    #[test]
    fn test_image_window_later_page_strips_everything() {
        let mut records: Vec<_> = (0..3).map(record).collect();
        apply_image_window(&mut records, 1);
        assert!(records.iter().all(|r| !r.has_image()));
    }
}
