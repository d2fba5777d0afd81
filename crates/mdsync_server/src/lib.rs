//! # Master-Data Sync Server
//!
//! Inbound surface for the master-data sync engine.
//!
//! This crate provides:
//! - Trigger handlers (document created, document updated, manual resync)
//! - Route table and error-to-status mapping
//! - Settings loading per invocation
//! - An in-process event channel and a worker draining resync continuations
//!
//! # Triggers
//!
//! | Method | Route             | Behavior                                   |
//! |--------|-------------------|--------------------------------------------|
//! | POST   | `sync-cl-created` | replicate one document in the background   |
//! | PUT    | `sync-cl-updated` | replicate one document, respond when done  |
//! | POST   | `sync-cl`         | start a manual resync                      |
//!
//! Continuations arrive as events on `sync-cl-manual-next` and each one
//! drives a single page of the resync.

#![deny(unsafe_code)]
#![warn(missing_docs)]
// Production code MUST NOT use panic!/unwrap()/expect()
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod error;
mod events;
mod handler;
mod server;
mod settings;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use events::{ChannelDispatcher, EventWorker, WorkerStats};
pub use handler::{
    HandlerContext, RequestHandler, TriggerResponse, MANUAL_SYNC_STARTED, SYNC_STARTED,
};
pub use server::SyncServer;
pub use settings::{FileSettingsLoader, RawSettings, SettingsLoader, StaticSettings};
