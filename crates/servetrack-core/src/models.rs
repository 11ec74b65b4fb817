//! Core data models for servetrack.
//!
//! Canonical records serialize with camelCase keys (the shape held in memory
//! and in the local cache). Write payloads (`New*`, `*Update`) serialize with
//! the snake_case keys the remote document store uses. Parsing raw documents
//! into these types goes through [`crate::normalize`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as JsonValue};

use crate::defaults;
use crate::error::{Error, Result};

// =============================================================================
// CLIENT TYPES
// =============================================================================

/// A client of the process-serving business. Root of ownership for cases,
/// serve attempts and documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: String,
    pub name: String,
    pub email: String,
    /// Extra notification addresses, in the order they were entered.
    #[serde(default)]
    pub additional_emails: Vec<String>,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub notes: String,
}

impl Client {
    /// Every registered address for this client: primary first, then the
    /// additional ones, skipping blanks and duplicates.
    pub fn recipients(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for email in std::iter::once(&self.email).chain(self.additional_emails.iter()) {
            let email = email.trim();
            if email.is_empty() || out.iter().any(|e| e.eq_ignore_ascii_case(email)) {
                continue;
            }
            out.push(email.to_string());
        }
        out
    }
}

/// Request for creating a client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewClient {
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub additional_emails: Vec<String>,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub notes: String,
}

impl NewClient {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidInput("Client name is required".to_string()));
        }
        Ok(())
    }
}

/// Partial client update. Only `Some` fields are written.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_emails: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl ClientUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.additional_emails.is_none()
            && self.phone.is_none()
            && self.address.is_none()
            && self.notes.is_none()
    }

    /// Apply the update to an in-memory copy.
    pub fn apply_to(&self, client: &mut Client) {
        if let Some(name) = &self.name {
            client.name = name.clone();
        }
        if let Some(email) = &self.email {
            client.email = email.clone();
        }
        if let Some(emails) = &self.additional_emails {
            client.additional_emails = emails.clone();
        }
        if let Some(phone) = &self.phone {
            client.phone = phone.clone();
        }
        if let Some(address) = &self.address {
            client.address = address.clone();
        }
        if let Some(notes) = &self.notes {
            client.notes = notes.clone();
        }
    }
}

// =============================================================================
// CASE TYPES
// =============================================================================

/// A legal case belonging to one client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Case {
    pub id: String,
    pub client_id: String,
    pub case_number: String,
    pub case_name: String,
    pub description: String,
    pub status: String,
    pub home_address: String,
    pub work_address: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Request for creating a case.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewCase {
    pub client_id: String,
    pub case_number: String,
    #[serde(default)]
    pub case_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub home_address: String,
    #[serde(default)]
    pub work_address: String,
}

impl NewCase {
    pub fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() {
            return Err(Error::InvalidInput(
                "Client ID is required to create a case".to_string(),
            ));
        }
        if self.case_number.trim().is_empty() {
            return Err(Error::InvalidInput("Case number is required".to_string()));
        }
        Ok(())
    }
}

/// Partial case update. Only `Some` fields are written.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaseUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub case_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub case_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_address: Option<String>,
}

// =============================================================================
// DOCUMENT TYPES
// =============================================================================

/// Metadata for an uploaded file. The bytes live in the storage bucket under
/// `file_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub client_id: String,
    pub case_number: Option<String>,
    pub file_name: String,
    pub file_size: u64,
    pub file_type: String,
    pub file_id: String,
    pub description: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// Request for uploading a document.
#[derive(Debug, Clone, Default)]
pub struct NewDocument {
    pub client_id: String,
    pub case_number: Option<String>,
    pub file_name: String,
    pub file_type: String,
    pub description: String,
    pub data: Vec<u8>,
}

impl NewDocument {
    pub fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() {
            return Err(Error::InvalidInput(
                "Client ID is required to upload a document".to_string(),
            ));
        }
        if self.file_name.trim().is_empty() {
            return Err(Error::InvalidInput("File name is required".to_string()));
        }
        Ok(())
    }
}

// =============================================================================
// SERVE ATTEMPT TYPES
// =============================================================================

/// Outcome of a serve attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ServeStatus {
    Completed,
    Failed,
    #[default]
    Unknown,
}

impl ServeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Unknown => defaults::UNKNOWN,
        }
    }

    /// Lenient parse: case and surrounding whitespace are ignored, anything
    /// unrecognized maps to `Unknown`.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for ServeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// GPS coordinates as supplied by a caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Coordinates {
    /// Already in `"lat,long"` form.
    Text(String),
    Point { latitude: f64, longitude: f64 },
}

impl Coordinates {
    /// Canonical `"lat,long"` string. Text passes through unchanged.
    pub fn to_canonical(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Point {
                latitude,
                longitude,
            } => format!("{},{}", latitude, longitude),
        }
    }
}

/// Canonical serve attempt record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServeAttempt {
    pub id: String,
    pub client_id: String,
    /// Denormalized for display.
    pub client_name: String,
    pub case_number: String,
    pub case_name: String,
    pub status: ServeStatus,
    pub notes: String,
    pub address: String,
    pub coordinates: Option<String>,
    /// Photo evidence, usually a base64 data URL. Large.
    pub image_data: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub attempt_number: u32,
}

impl ServeAttempt {
    pub fn has_image(&self) -> bool {
        self.image_data.is_some()
    }

    pub fn strip_image(&mut self) {
        self.image_data = None;
    }
}

/// Request for recording a serve attempt.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewServeAttempt {
    pub client_id: String,
    /// Resolved from the client record when absent.
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default)]
    pub case_number: Option<String>,
    #[serde(default)]
    pub case_name: Option<String>,
    #[serde(default)]
    pub status: ServeStatus,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
    #[serde(default)]
    pub image_data: Option<String>,
    /// Defaults to the time of creation.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub attempt_number: Option<u32>,
}

impl NewServeAttempt {
    pub fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() {
            return Err(Error::InvalidInput(
                "Client ID is required to create a serve attempt".to_string(),
            ));
        }
        Ok(())
    }
}

/// Update request for a serve attempt.
///
/// Only `notes`, `status`, `case_number` and `case_name` are ever written.
/// The remaining fields are accepted so callers can pass a whole edited
/// record back, but they are immutable once recorded and never reach the
/// update payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServeAttemptUpdate {
    #[serde(default, alias = "caseNumber")]
    pub case_number: Option<String>,
    #[serde(default, alias = "caseName")]
    pub case_name: Option<String>,
    #[serde(default)]
    pub status: Option<ServeStatus>,
    #[serde(default)]
    pub notes: Option<String>,

    #[serde(default, alias = "clientId")]
    pub client_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
    #[serde(default, alias = "imageData")]
    pub image_data: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default, alias = "attemptNumber")]
    pub attempt_number: Option<u32>,
}

impl ServeAttemptUpdate {
    /// Minimal store-shaped patch: mutable fields that are present and differ
    /// from `stored`.
    pub fn changes_from(&self, stored: &ServeAttempt) -> Map<String, JsonValue> {
        let mut changes = Map::new();
        if let Some(notes) = &self.notes {
            if *notes != stored.notes {
                changes.insert("notes".to_string(), json!(notes));
            }
        }
        if let Some(status) = self.status {
            if status != stored.status {
                changes.insert("status".to_string(), json!(status.as_str()));
            }
        }
        if let Some(case_number) = &self.case_number {
            if *case_number != stored.case_number {
                changes.insert("case_number".to_string(), json!(case_number));
            }
        }
        if let Some(case_name) = &self.case_name {
            if *case_name != stored.case_name {
                changes.insert("case_name".to_string(), json!(case_name));
            }
        }
        changes
    }
}
