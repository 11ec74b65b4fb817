//! Tracing subscriber setup.
//!
//! Environment variables:
//!   LOG_FORMAT  - "json" or "text" (default: "text")
//!   LOG_FILE    - path to log file (optional, enables daily-rotated file logging)
//!   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
//!   RUST_LOG    - standard env filter (default: "servetrack=info")

use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use servetrack_core::{Error, Result};

/// Target prefix match, so this covers every `servetrack_*` crate.
pub const DEFAULT_FILTER: &str = "servetrack=info";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    pub format: LogFormat,
    pub file: Option<PathBuf>,
    pub ansi: Option<bool>,
}

impl LogConfig {
    pub fn from_env() -> Self {
        let format = match std::env::var("LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };
        Self {
            format,
            file: std::env::var("LOG_FILE").ok().map(PathBuf::from),
            ansi: std::env::var("LOG_ANSI")
                .ok()
                .map(|v| v == "true" || v == "1"),
        }
    }
}

/// Install the global subscriber.
///
/// Keep the returned guard alive for as long as file logging should flush.
/// Fails if a global subscriber is already set.
pub fn init_tracing(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_FILTER.into());
    let registry = tracing_subscriber::registry().with(env_filter);

    let init_err = |e: tracing_subscriber::util::TryInitError| {
        Error::Config(format!("Failed to install tracing subscriber: {}", e))
    };

    let guard = if let Some(ref path) = config.file {
        let file_dir = path.parent().unwrap_or(Path::new("."));
        let file_name = path
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("servetrack.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        match config.format {
            LogFormat::Json => registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .try_init()
                .map_err(init_err)?,
            LogFormat::Text => registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(config.ansi.unwrap_or(false)),
                )
                .try_init()
                .map_err(init_err)?,
        }
        Some(guard)
    } else {
        match config.format {
            LogFormat::Json => registry
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()
                .map_err(init_err)?,
            LogFormat::Text => {
                let mut layer = tracing_subscriber::fmt::layer();
                if let Some(ansi) = config.ansi {
                    layer = layer.with_ansi(ansi);
                }
                registry.with(layer).try_init().map_err(init_err)?
            }
        }
        None
    };

    tracing::info!(
        log_format = ?config.format,
        log_file = %config
            .file
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(stdout)".to_string()),
        "Logging initialized"
    );
    Ok(guard)
}
