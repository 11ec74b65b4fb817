//! Error types for servetrack.

use thiserror::Error;

/// Result type alias using servetrack's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Message shown to the user when an error carries no usable text.
pub const GENERIC_USER_MESSAGE: &str = "Something went wrong. Please try again.";

/// Core error type for servetrack operations.
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP/network request failed before a response arrived
    #[error("Request error: {0}")]
    Request(String),

    /// The document-store service answered with a non-success status
    #[error("Remote error ({status}): {message}")]
    Remote { status: u16, message: String },

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Client not found
    #[error("Client not found: {0}")]
    ClientNotFound(String),

    /// Serve attempt not found
    #[error("Serve attempt not found: {0}")]
    ServeAttemptNotFound(String),

    /// Invalid input (missing required field, malformed value)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Blob or local cache storage failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the failure is worth degrading around (network, 5xx, 429)
    /// rather than reporting as a hard failure.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Request(_) => true,
            Error::Remote { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Whether the error means the addressed record does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::NotFound(_)
                | Error::ClientNotFound(_)
                | Error::ServeAttemptNotFound(_)
                | Error::Remote { status: 404, .. }
        )
    }

    /// Text for a dismissible user-facing notice.
    ///
    /// Falls back to [`GENERIC_USER_MESSAGE`] when the underlying message is blank.
    pub fn user_message(&self) -> String {
        let detail = match self {
            Error::Request(m)
            | Error::NotFound(m)
            | Error::ClientNotFound(m)
            | Error::ServeAttemptNotFound(m)
            | Error::InvalidInput(m)
            | Error::Serialization(m)
            | Error::Config(m)
            | Error::Storage(m)
            | Error::Internal(m) => m.as_str(),
            Error::Remote { message, .. } => message.as_str(),
            Error::Io(_) => return self.to_string(),
        };
        if detail.trim().is_empty() {
            GENERIC_USER_MESSAGE.to_string()
        } else {
            self.to_string()
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => Error::Remote {
                status: status.as_u16(),
                message: e.to_string(),
            },
            None => Error::Request(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_not_found() {
        let err = Error::NotFound("test resource".to_string());
        assert_eq!(err.to_string(), "Not found: test resource");
    }

    #[test]
    fn test_error_display_remote() {
        let err = Error::Remote {
            status: 503,
            message: "service unavailable".to_string(),
        };
        assert_eq!(err.to_string(), "Remote error (503): service unavailable");
    }

    #[test]
    fn test_error_display_client_not_found() {
        let err = Error::ClientNotFound("abc123".to_string());
        assert_eq!(err.to_string(), "Client not found: abc123");
    }

    #[test]
    fn test_transient_classification() {
        assert!(Error::Request("connection reset".to_string()).is_transient());
        assert!(Error::Remote {
            status: 500,
            message: String::new()
        }
        .is_transient());
        assert!(Error::Remote {
            status: 429,
            message: String::new()
        }
        .is_transient());
        assert!(!Error::Remote {
            status: 400,
            message: String::new()
        }
        .is_transient());
        assert!(!Error::InvalidInput("client_id".to_string()).is_transient());
    }

    #[test]
    fn test_not_found_classification() {
        assert!(Error::NotFound("x".to_string()).is_not_found());
        assert!(Error::Remote {
            status: 404,
            message: "Document not found".to_string()
        }
        .is_not_found());
        assert!(!Error::Internal("x".to_string()).is_not_found());
    }

    #[test]
    fn test_user_message_uses_error_text() {
        let err = Error::InvalidInput("Client is required".to_string());
        assert_eq!(err.user_message(), "Invalid input: Client is required");
    }

    #[test]
    fn test_user_message_falls_back_when_blank() {
        let err = Error::Remote {
            status: 500,
            message: "  ".to_string(),
        };
        assert_eq!(err.user_message(), GENERIC_USER_MESSAGE);

        let err = Error::Internal(String::new());
        assert_eq!(err.user_message(), GENERIC_USER_MESSAGE);
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        match err {
            Error::Serialization(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("access denied"));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
