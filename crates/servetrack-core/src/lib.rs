//! # servetrack-core
//!
//! Core types, traits, and normalization for servetrack, the field-tracking
//! backend for process servers.
//!
//! This crate provides the domain records (clients, cases, serve attempts,
//! documents), the parser that turns raw store documents into those records,
//! the change-feed bus, and the traits the gateway uses to reach the remote
//! service.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events, completed mutations |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration |

pub mod defaults;
pub mod error;
pub mod events;
pub mod models;
pub mod normalize;
pub mod query;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use events::{ChangeEvent, ChangeKind, Collection, EventBus, FeedEvent, Subscription};
pub use models::*;
pub use normalize::{
    coerce_timestamp, normalize_coordinates, normalize_serve_attempt, normalize_serve_attempts,
    parse_all, parse_case, parse_client, parse_document,
};
pub use query::Query;
pub use traits::*;
