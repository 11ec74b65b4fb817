//! # servetrack-app
//!
//! Orchestration layer: owns in-memory state, drives the gateway, and keeps
//! the local mirror and state reconciled with the remote store.

pub mod config;
pub mod orchestrator;
pub mod telemetry;

pub use config::AppConfig;
pub use orchestrator::{user_notice, Orchestrator, State};
pub use telemetry::{init_tracing, LogConfig, LogFormat};
