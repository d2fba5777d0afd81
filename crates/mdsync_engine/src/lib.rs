//! # Master-Data Sync Engine
//!
//! Replicates master-data documents from a master account to a set of
//! sub-accounts.
//!
//! This crate provides:
//! - Upsert resolution (match by id, then by email, else create)
//! - Chunked concurrent dispatch with a fixed pause between chunks
//! - Retry with exponential backoff
//! - Sequential fan-out across sub-accounts
//! - A self-continuing scroll for full resyncs
//! - HTTP and in-memory store implementations
//!
//! ## Architecture
//!
//! Three triggers drive the engine:
//! 1. A single document changed: fetch it from the master, fan it out
//! 2. A manual resync was requested: emit the first continuation
//! 3. A continuation arrived: read one scroll page, fan it out, emit the next
//!
//! ## Key Invariants
//!
//! - Per-document failures never abort a batch
//! - An unreachable sub-account never aborts the fan-out
//! - Only 408, 429 and 5xx responses are retried
//! - One invocation reads at most one scroll page
//! - The date filter is identical across every page of one resync

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod dispatch;
mod document;
mod engine;
mod error;
mod events;
mod fanout;
mod http;
mod memory;
mod pagination;
mod retry;
mod single;
mod store;
mod upsert;

pub use config::{
    split_list, Credentials, DispatchConfig, EngineConfig, PaginationConfig, RetryConfig,
    SyncSettings, CONTINUATION_TOPIC, DEFAULT_DATA_ENTITY,
};
pub use dispatch::{BatchDispatcher, DispatchReport};
pub use document::{Document, DOCUMENT_FIELD, EMAIL_FIELD, ID_FIELD};
pub use engine::ReplicationEngine;
pub use error::{SyncError, SyncResult};
pub use events::{EventDispatcher, RecordingDispatcher, SentEvent};
pub use fanout::{FanOutCoordinator, FanOutReport, TargetOutcome, TargetReport};
pub use http::{account_base_url, AccountConnector, HttpStore, HttpStoreConfig, SCROLL_TOKEN_HEADER};
pub use memory::{MemoryConnector, MemoryStore, StoreCall, StoreOperation};
pub use pagination::{CursorLoop, CursorState, PageOutcome, SyncContinuation};
pub use retry::RetryExecutor;
pub use single::SingleDocumentSync;
pub use store::{
    DocumentRef, DocumentStore, Predicate, ScrollPage, ScrollRequest, SearchQuery, StoreConnector,
};
pub use upsert::{PendingUpsert, Resolution, UpsertOutcome, UpsertResolver};
