//! # servetrack-gateway
//!
//! Remote data gateway for servetrack.
//!
//! A [`Gateway`] wraps the remote document store, the document storage
//! bucket, and the email function behind one explicitly constructed value.
//! The transport is pluggable: [`rest::RestBackend`] talks to the hosted
//! service, [`memory::MemoryStore`] backs tests.
//!
//! Every successful mutation is published on the gateway's change feed.
//! List operations come in two flavors: `try_*` returns the error, the plain
//! form logs it and degrades to an empty result.

pub mod cases;
pub mod clients;
pub mod config;
pub mod documents;
pub mod gateway;
pub mod memory;
pub mod notify;
pub mod rest;
pub mod serves;

pub use clients::{CascadeFailure, CascadeReport};
pub use config::{CollectionIds, GatewayConfig};
pub use gateway::{Gateway, Mutation, FILE_REF_PATTERN};
pub use memory::{MemoryStore, StoreCall};
pub use notify::{
    EmailAttachment, EmailMessage, NotificationOutcome, NotificationTicket, Notifier,
};
pub use rest::RestBackend;
pub use serves::apply_image_window;
