//! Email notifications through the managed function endpoint.
//!
//! Sending is queued as its own task. The caller gets a
//! [`NotificationTicket`] whose outcome can be awaited or ignored; it never
//! feeds back into the result of the mutation that triggered it.

use serde::Serialize;
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use servetrack_core::{Client, FunctionRunner, ServeAttempt};

/// Inline attachment, content kept base64-encoded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmailAttachment {
    pub filename: String,
    pub content: String,
    #[serde(rename = "contentType")]
    pub content_type: String,
}

impl EmailAttachment {
    /// Build from a `data:<mime>;base64,<payload>` URL. Returns `None` for
    /// anything else.
    pub fn from_data_url(data_url: &str, stem: &str) -> Option<Self> {
        let rest = data_url.strip_prefix("data:")?;
        let (meta, payload) = rest.split_once(',')?;
        let content_type = meta.strip_suffix(";base64")?;
        if payload.is_empty() {
            return None;
        }
        let content_type = if content_type.is_empty() {
            "application/octet-stream"
        } else {
            content_type
        };
        let extension = content_type
            .rsplit('/')
            .next()
            .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or("bin");

        Some(Self {
            filename: format!("{}.{}", stem, extension),
            content: payload.to_string(),
            content_type: content_type.to_string(),
        })
    }
}

/// One outbound email.
#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
    pub attachment: Option<EmailAttachment>,
}

impl EmailMessage {
    /// Append `business` to the recipients unless already present
    /// (case-insensitive).
    pub fn with_business_copy(mut self, business: &str) -> Self {
        let business = business.trim();
        if !business.is_empty() && !self.to.iter().any(|r| r.eq_ignore_ascii_case(business)) {
            self.to.push(business.to_string());
        }
        self
    }

    pub fn to_payload(&self) -> JsonValue {
        let mut payload = json!({
            "to": self.to,
            "subject": self.subject,
            "html": self.html,
        });
        if let Some(attachment) = &self.attachment {
            payload["attachments"] = json!([attachment]);
        }
        payload
    }
}

/// Observable result of one send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationOutcome {
    Sent,
    Failed(String),
}

impl NotificationOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent)
    }
}

/// Handle to a queued send.
#[derive(Debug)]
pub struct NotificationTicket {
    handle: JoinHandle<NotificationOutcome>,
}

impl NotificationTicket {
    /// Wait for the send to settle.
    pub async fn outcome(self) -> NotificationOutcome {
        match self.handle.await {
            Ok(outcome) => outcome,
            Err(e) => NotificationOutcome::Failed(format!("notification task aborted: {}", e)),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Queues emails on the function endpoint.
#[derive(Clone)]
pub struct Notifier {
    runner: Arc<dyn FunctionRunner>,
    function_id: String,
    business_email: String,
}

impl Notifier {
    pub fn new(
        runner: Arc<dyn FunctionRunner>,
        function_id: impl Into<String>,
        business_email: impl Into<String>,
    ) -> Self {
        Self {
            runner,
            function_id: function_id.into(),
            business_email: business_email.into(),
        }
    }

    /// Queue a send. Failures are logged and reported on the ticket.
    pub fn send(&self, message: EmailMessage) -> NotificationTicket {
        let message = message.with_business_copy(&self.business_email);
        let runner = self.runner.clone();
        let function_id = self.function_id.clone();

        let handle = tokio::spawn(async move {
            debug!(
                recipients = message.to.len(),
                subject = %message.subject,
                has_attachment = message.attachment.is_some(),
                "notify: sending email"
            );
            match runner.execute(&function_id, message.to_payload()).await {
                Ok(execution) if execution.succeeded() => {
                    info!(subject = %message.subject, "notify: email sent");
                    NotificationOutcome::Sent
                }
                Ok(execution) => {
                    warn!(
                        status = %execution.status,
                        response_status_code = execution.response_status_code,
                        "notify: email function reported failure"
                    );
                    NotificationOutcome::Failed(format!(
                        "email function returned {} ({})",
                        execution.response_status_code, execution.status
                    ))
                }
                Err(e) => {
                    warn!(error = %e, "notify: email send failed");
                    NotificationOutcome::Failed(e.to_string())
                }
            }
        });

        NotificationTicket { handle }
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn serve_rows(serve: &ServeAttempt) -> String {
    let mut rows = vec![
        ("Client", serve.client_name.clone()),
        ("Case", format!("{} ({})", serve.case_name, serve.case_number)),
        ("Status", serve.status.to_string()),
        ("Attempt", serve.attempt_number.to_string()),
        ("Time", serve.timestamp.format("%Y-%m-%d %H:%M UTC").to_string()),
    ];
    if !serve.address.is_empty() {
        rows.push(("Address", serve.address.clone()));
    }
    if let Some(coords) = &serve.coordinates {
        rows.push(("GPS", coords.clone()));
    }
    if !serve.notes.is_empty() {
        rows.push(("Notes", serve.notes.clone()));
    }
    rows.iter()
        .map(|(label, value)| {
            format!(
                "<tr><th align=\"left\">{}</th><td>{}</td></tr>",
                label,
                escape_html(value)
            )
        })
        .collect()
}

/// Email sent after a serve attempt is recorded. The photo, when present,
/// goes along as an attachment.
pub fn serve_created_email(serve: &ServeAttempt, recipients: Vec<String>) -> EmailMessage {
    EmailMessage {
        to: recipients,
        subject: format!(
            "Serve attempt #{} {}: {}",
            serve.attempt_number, serve.status, serve.case_number
        ),
        html: format!(
            "<h2>Serve attempt recorded</h2><table>{}</table>",
            serve_rows(serve)
        ),
        attachment: serve
            .image_data
            .as_deref()
            .and_then(|url| EmailAttachment::from_data_url(url, &format!("serve-{}", serve.id))),
    }
}

/// Email sent to the owning client after a serve attempt changes.
pub fn serve_updated_email(serve: &ServeAttempt, client: &Client) -> EmailMessage {
    EmailMessage {
        to: client.recipients(),
        subject: format!("Serve attempt updated: {}", serve.case_number),
        html: format!(
            "<p>Hello {},</p><h2>Serve attempt updated</h2><table>{}</table>",
            escape_html(&client.name),
            serve_rows(serve)
        ),
        attachment: None,
    }
}
