//! Centralized default constants for servetrack.
//!
//! **This module is the single source of truth** for shared default values.
//! Config types fall back to these constants when a setting is not provided.

// =============================================================================
// DOCUMENT STORE
// =============================================================================

/// Default document-store endpoint.
pub const ENDPOINT: &str = "https://cloud.appwrite.io/v1";

/// Default database identifier.
pub const DATABASE_ID: &str = "servetrack";

/// Default collection identifier for clients.
pub const CLIENTS_COLLECTION: &str = "clients";

/// Default collection identifier for serve attempts.
pub const SERVE_ATTEMPTS_COLLECTION: &str = "serve_attempts";

/// Default collection identifier for cases.
pub const CASES_COLLECTION: &str = "client_cases";

/// Default collection identifier for documents.
pub const DOCUMENTS_COLLECTION: &str = "client_documents";

/// Default storage bucket for uploaded document files.
pub const DOCUMENTS_BUCKET: &str = "client_documents";

/// Default function identifier used to send email notifications.
pub const EMAIL_FUNCTION: &str = "send_email";

/// Business address appended to every outbound notification.
pub const BUSINESS_EMAIL: &str = "info@justlegalsolutions.org";

/// Request timeout for document-store calls in seconds.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// PAGINATION
// =============================================================================

/// Default page size for serve attempt listings.
pub const SERVE_PAGE_LIMIT: u32 = 100;

/// Internal "fetch everything" limit for cascade and lookup queries.
pub const INTERNAL_FETCH_LIMIT: u32 = 5_000;

/// Only the first N records of an offset-zero page keep their image payload.
pub const IMAGE_WINDOW: usize = 20;

// =============================================================================
// LOCAL CACHE
// =============================================================================

/// Number of most-recent serve attempts mirrored locally.
pub const CACHE_WINDOW: u32 = 100;

/// Serialized size above which a sync batch drops every image payload (5 MiB).
pub const CACHE_MAX_BYTES: usize = 5 * 1024 * 1024;

/// Default directory for the file-backed local store.
pub const CACHE_DIR: &str = ".servetrack-cache";

/// Quiet period the mirror waits for after a change before resyncing.
pub const CACHE_RESYNC_DELAY_MS: u64 = 250;

// =============================================================================
// ORCHESTRATION
// =============================================================================

/// Delay before the reconcile refresh that follows an optimistic update.
pub const REFRESH_DELAY_MS: u64 = 500;

/// Default event bus broadcast channel capacity.
pub const EVENT_BUS_CAPACITY: usize = 256;

// =============================================================================
// RECORD DEFAULTS
// =============================================================================

/// Placeholder for unknown status and case fields.
pub const UNKNOWN: &str = "unknown";

/// Display name used when a serve attempt's client cannot be resolved.
pub const UNKNOWN_CLIENT: &str = "Unknown Client";

/// Attempt number assigned when none is supplied.
pub const ATTEMPT_NUMBER: u32 = 1;

// =============================================================================
// ENVIRONMENT VARIABLES
// =============================================================================

pub const ENV_ENDPOINT: &str = "SERVETRACK_ENDPOINT";
pub const ENV_PROJECT_ID: &str = "SERVETRACK_PROJECT_ID";
pub const ENV_API_KEY: &str = "SERVETRACK_API_KEY";
pub const ENV_DATABASE_ID: &str = "SERVETRACK_DATABASE_ID";
pub const ENV_CLIENTS_COLLECTION: &str = "SERVETRACK_CLIENTS_COLLECTION";
pub const ENV_SERVE_ATTEMPTS_COLLECTION: &str = "SERVETRACK_SERVE_ATTEMPTS_COLLECTION";
pub const ENV_CASES_COLLECTION: &str = "SERVETRACK_CASES_COLLECTION";
pub const ENV_DOCUMENTS_COLLECTION: &str = "SERVETRACK_DOCUMENTS_COLLECTION";
pub const ENV_DOCUMENTS_BUCKET: &str = "SERVETRACK_DOCUMENTS_BUCKET";
pub const ENV_EMAIL_FUNCTION: &str = "SERVETRACK_EMAIL_FUNCTION";
pub const ENV_BUSINESS_EMAIL: &str = "SERVETRACK_BUSINESS_EMAIL";
pub const ENV_REQUEST_TIMEOUT: &str = "SERVETRACK_REQUEST_TIMEOUT";
pub const ENV_CACHE_DIR: &str = "SERVETRACK_CACHE_DIR";
pub const ENV_CACHE_WINDOW: &str = "SERVETRACK_CACHE_WINDOW";
pub const ENV_CACHE_MAX_BYTES: &str = "SERVETRACK_CACHE_MAX_BYTES";
pub const ENV_CACHE_RESYNC_DELAY_MS: &str = "SERVETRACK_CACHE_RESYNC_DELAY_MS";
pub const ENV_REFRESH_DELAY_MS: &str = "SERVETRACK_REFRESH_DELAY_MS";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_window_fits_inside_cache_window() {
        assert!(IMAGE_WINDOW <= CACHE_WINDOW as usize);
    }

    #[test]
    fn test_cache_max_bytes_is_five_mebibytes() {
        assert_eq!(CACHE_MAX_BYTES, 5_242_880);
    }
}
