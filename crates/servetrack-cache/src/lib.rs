//! # servetrack-cache
//!
//! Local persisted mirror of a bounded, most-recent window of remote data.
//!
//! Two keys are kept: the client collection and the newest serve attempts.
//! Each is fully replaced on every sync. Image payloads are capped both by
//! position (newest 20 only) and by total serialized size.

pub mod config;
pub mod mirror;
pub mod store;

pub use config::CacheConfig;
pub use mirror::{apply_memory_bounds, CacheMirror, ServesUpdated, CLIENTS_KEY, SERVES_KEY};
pub use store::{FileStore, LocalStore, MemoryLocalStore};
