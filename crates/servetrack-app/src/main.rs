//! Sync daemon: keeps the local mirror and in-memory state reconciled with
//! the remote store until interrupted.

use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

use servetrack_app::{init_tracing, AppConfig, Orchestrator};
use servetrack_cache::{CacheMirror, FileStore};
use servetrack_core::Result;
use servetrack_gateway::Gateway;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("servetrack-sync: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let _log_guard = match init_tracing(&config.log) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("servetrack-sync: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "servetrack-sync stopped");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: AppConfig) -> Result<()> {
    let gateway = Arc::new(Gateway::connect(config.gateway.clone())?);
    let cache = Arc::new(CacheMirror::new(
        gateway.clone(),
        Arc::new(FileStore::new(config.cache.dir.clone())),
        config.cache.clone(),
    ));
    let orchestrator = Orchestrator::new(gateway, Some(cache.clone()), config.refresh_delay);

    if !cache.sync_all().await {
        info!("Initial mirror sync incomplete, serving cached data where available");
    }
    orchestrator.refresh().await;

    let resync = cache.spawn_resync();
    let changes = orchestrator.spawn_change_loop();
    info!(cache_dir = %config.cache.dir.display(), "servetrack-sync running");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");
    changes.abort();
    resync.abort();
    Ok(())
}
