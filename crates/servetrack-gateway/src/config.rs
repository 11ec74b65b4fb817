//! Gateway configuration.

use servetrack_core::{defaults, Collection, Error, Result};

/// Collection identifiers inside the configured database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionIds {
    pub clients: String,
    pub serve_attempts: String,
    pub cases: String,
    pub documents: String,
}

impl CollectionIds {
    pub fn id_for(&self, collection: Collection) -> &str {
        match collection {
            Collection::Clients => &self.clients,
            Collection::ServeAttempts => &self.serve_attempts,
            Collection::Cases => &self.cases,
            Collection::Documents => &self.documents,
        }
    }
}

impl Default for CollectionIds {
    fn default() -> Self {
        Self {
            clients: defaults::CLIENTS_COLLECTION.to_string(),
            serve_attempts: defaults::SERVE_ATTEMPTS_COLLECTION.to_string(),
            cases: defaults::CASES_COLLECTION.to_string(),
            documents: defaults::DOCUMENTS_COLLECTION.to_string(),
        }
    }
}

/// Everything needed to reach the remote service.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL, e.g. `https://cloud.appwrite.io/v1`.
    pub endpoint: String,
    pub project_id: String,
    /// Server API key. Optional when the endpoint authenticates by session.
    pub api_key: Option<String>,
    pub database_id: String,
    pub collections: CollectionIds,
    /// Bucket holding uploaded document files.
    pub documents_bucket: String,
    /// Function that delivers email notifications.
    pub email_function: String,
    /// Always copied on outbound notifications.
    pub business_email: String,
    pub timeout_seconds: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            endpoint: defaults::ENDPOINT.to_string(),
            project_id: String::new(),
            api_key: None,
            database_id: defaults::DATABASE_ID.to_string(),
            collections: CollectionIds::default(),
            documents_bucket: defaults::DOCUMENTS_BUCKET.to_string(),
            email_function: defaults::EMAIL_FUNCTION.to_string(),
            business_email: defaults::BUSINESS_EMAIL.to_string(),
            timeout_seconds: defaults::REQUEST_TIMEOUT_SECS,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

impl GatewayConfig {
    /// Create from `SERVETRACK_*` environment variables.
    ///
    /// `SERVETRACK_PROJECT_ID` is required; everything else has a default.
    pub fn from_env() -> Result<Self> {
        let project_id = std::env::var(defaults::ENV_PROJECT_ID)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                Error::Config(format!("{} must be set", defaults::ENV_PROJECT_ID))
            })?;

        let config = Self {
            endpoint: env_or(defaults::ENV_ENDPOINT, defaults::ENDPOINT),
            project_id,
            api_key: std::env::var(defaults::ENV_API_KEY).ok(),
            database_id: env_or(defaults::ENV_DATABASE_ID, defaults::DATABASE_ID),
            collections: CollectionIds {
                clients: env_or(defaults::ENV_CLIENTS_COLLECTION, defaults::CLIENTS_COLLECTION),
                serve_attempts: env_or(
                    defaults::ENV_SERVE_ATTEMPTS_COLLECTION,
                    defaults::SERVE_ATTEMPTS_COLLECTION,
                ),
                cases: env_or(defaults::ENV_CASES_COLLECTION, defaults::CASES_COLLECTION),
                documents: env_or(
                    defaults::ENV_DOCUMENTS_COLLECTION,
                    defaults::DOCUMENTS_COLLECTION,
                ),
            },
            documents_bucket: env_or(defaults::ENV_DOCUMENTS_BUCKET, defaults::DOCUMENTS_BUCKET),
            email_function: env_or(defaults::ENV_EMAIL_FUNCTION, defaults::EMAIL_FUNCTION),
            business_email: env_or(defaults::ENV_BUSINESS_EMAIL, defaults::BUSINESS_EMAIL),
            timeout_seconds: std::env::var(defaults::ENV_REQUEST_TIMEOUT)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults::REQUEST_TIMEOUT_SECS),
        };

        tracing::debug!(
            endpoint = %config.endpoint,
            database_id = %config.database_id,
            api_key_set = config.api_key.is_some(),
            "Gateway configuration loaded from environment"
        );
        Ok(config)
    }

    /// Load a `.env` file if present, then read the environment.
    pub fn from_dotenv() -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            tracing::debug!(error = %e, "No .env file loaded");
        }
        Self::from_env()
    }
}
