//! Top-level configuration assembled from the environment.

use std::time::Duration;

use servetrack_cache::CacheConfig;
use servetrack_core::{defaults, Result};
use servetrack_gateway::GatewayConfig;

use crate::telemetry::LogConfig;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub gateway: GatewayConfig,
    pub cache: CacheConfig,
    pub log: LogConfig,
    /// Delay before the reconciling refresh after a mutation.
    pub refresh_delay: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            cache: CacheConfig::default(),
            log: LogConfig::default(),
            refresh_delay: Duration::from_millis(defaults::REFRESH_DELAY_MS),
        }
    }
}

impl AppConfig {
    /// Load `.env` if present, then read every section from the environment.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Ok(Self {
            gateway: GatewayConfig::from_env()?,
            cache: CacheConfig::from_env(),
            log: LogConfig::from_env(),
            refresh_delay: Duration::from_millis(
                std::env::var(defaults::ENV_REFRESH_DELAY_MS)
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults::REFRESH_DELAY_MS),
            ),
        })
    }
}
