//! Trigger and event handlers.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::settings::SettingsLoader;
use mdsync_engine::{PageOutcome, ReplicationEngine, SyncContinuation};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Response message of the document triggers.
pub const SYNC_STARTED: &str = "Sync process started";

/// Response message of the manual resync trigger.
pub const MANUAL_SYNC_STARTED: &str = "Manual sync process started";

/// Response to a trigger request.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerResponse {
    /// HTTP-like status.
    pub status: u16,
    /// JSON body.
    pub body: Value,
}

impl TriggerResponse {
    /// A 200 response carrying `message`.
    pub fn ok(message: &str) -> Self {
        Self {
            status: 200,
            body: json!({ "message": message }),
        }
    }

    /// The response for a failed request.
    pub fn from_error(err: &ServerError) -> Self {
        Self {
            status: err.status_code(),
            body: json!({ "error": err.to_string() }),
        }
    }

    /// Returns true for 2xx responses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Shared state for request handling.
pub struct HandlerContext {
    /// Server configuration.
    pub config: ServerConfig,
    /// Replication engine.
    pub engine: Arc<ReplicationEngine>,
    /// Per-invocation settings source.
    pub settings: Arc<dyn SettingsLoader>,
    detached: Mutex<Vec<JoinHandle<()>>>,
}

impl HandlerContext {
    /// Creates a new handler context.
    pub fn new(
        config: ServerConfig,
        engine: Arc<ReplicationEngine>,
        settings: Arc<dyn SettingsLoader>,
    ) -> Self {
        Self {
            config,
            engine,
            settings,
            detached: Mutex::new(Vec::new()),
        }
    }

    fn track(&self, handle: JoinHandle<()>) {
        let mut detached = self.detached.lock();
        detached.retain(|h| !h.is_finished());
        detached.push(handle);
    }

    /// Number of detached replications still running.
    pub fn detached_in_flight(&self) -> usize {
        self.detached.lock().iter().filter(|h| !h.is_finished()).count()
    }

    /// Waits for every detached replication started so far.
    pub async fn wait_detached(&self) {
        let handles = std::mem::take(&mut *self.detached.lock());
        for handle in handles {
            if let Err(err) = handle.await {
                error!(error = %err, "detached sync task failed");
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct DocumentTrigger {
    #[serde(rename = "Id")]
    id: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct ManualSyncRequest {
    #[serde(rename = "syncDate", default)]
    sync_date: Option<String>,
}

fn document_id(body: &[u8]) -> ServerResult<String> {
    let trigger: DocumentTrigger = serde_json::from_slice(body)
        .map_err(|e| ServerError::InvalidRequest(format!("malformed body: {}", e)))?;
    match trigger.id {
        Some(Value::String(id)) if !id.trim().is_empty() => Ok(id.trim().to_string()),
        _ => Err(ServerError::InvalidRequest("body must carry a string Id".into())),
    }
}

/// Handler for the sync triggers.
pub struct RequestHandler {
    context: Arc<HandlerContext>,
}

impl RequestHandler {
    /// Creates a new request handler.
    pub fn new(context: Arc<HandlerContext>) -> Self {
        Self { context }
    }

    /// Create trigger: replicates the document in the background and
    /// responds immediately.
    pub async fn handle_created(&self, body: &[u8]) -> ServerResult<TriggerResponse> {
        let id = document_id(body)?;
        let settings = self.context.settings.load()?;
        info!(document_id = %id, "create trigger received");

        let engine = Arc::clone(&self.context.engine);
        let handle = tokio::spawn(async move {
            if let Err(err) = engine.sync_one(&id, &settings).await {
                error!(document_id = %id, error = %err.detail(), "document sync failed");
            }
        });
        self.context.track(handle);

        Ok(TriggerResponse::ok(SYNC_STARTED))
    }

    /// Update trigger: replicates the document and responds once done.
    pub async fn handle_updated(&self, body: &[u8]) -> ServerResult<TriggerResponse> {
        let id = document_id(body)?;
        let settings = self.context.settings.load()?;
        info!(document_id = %id, "update trigger received");

        let report = self
            .context
            .engine
            .sync_one(&id, &settings)
            .await
            .map_err(|err| {
                error!(document_id = %id, error = %err.detail(), "document sync failed");
                ServerError::from(err)
            })?;

        if report.failed() > 0 || report.unreachable() > 0 {
            warn!(
                document_id = %id,
                failed = report.failed(),
                unreachable = report.unreachable(),
                "document sync finished with failures"
            );
        }
        Ok(TriggerResponse::ok(SYNC_STARTED))
    }

    /// Manual resync trigger: emits the first continuation.
    ///
    /// An empty body starts a full resync.
    pub async fn handle_manual_start(&self, body: &[u8]) -> ServerResult<TriggerResponse> {
        let request: ManualSyncRequest = if body.iter().all(u8::is_ascii_whitespace) {
            ManualSyncRequest::default()
        } else {
            serde_json::from_slice(body)
                .map_err(|e| ServerError::InvalidRequest(format!("malformed body: {}", e)))?
        };
        info!(sync_date = ?request.sync_date, "manual sync trigger received");

        self.context.engine.start_manual_sync(request.sync_date).await?;
        Ok(TriggerResponse::ok(MANUAL_SYNC_STARTED))
    }

    /// Continuation event: runs one page of the resync.
    pub async fn handle_continue(&self, payload: Value) -> ServerResult<PageOutcome> {
        let continuation: SyncContinuation = serde_json::from_value(payload)
            .map_err(|e| ServerError::InvalidRequest(format!("malformed continuation: {}", e)))?;
        let settings = self.context.settings.load()?;

        Ok(self
            .context
            .engine
            .continue_manual_sync(&continuation, &settings)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_id_extraction() {
        assert_eq!(document_id(br#"{"Id":"doc-1"}"#).unwrap(), "doc-1");
        assert_eq!(document_id(br#"{"Id":" doc-2 ","extra":true}"#).unwrap(), "doc-2");

        let malformed: [&[u8]; 5] = [b"{}", br#"{"Id":""}"#, br#"{"Id":7}"#, b"not json", b""];
        for body in malformed {
            assert!(matches!(
                document_id(body),
                Err(ServerError::InvalidRequest(_))
            ));
        }
    }

    #[test]
    fn responses() {
        let ok = TriggerResponse::ok(SYNC_STARTED);
        assert!(ok.is_success());
        assert_eq!(ok.body, json!({"message": "Sync process started"}));

        let failed = TriggerResponse::from_error(&ServerError::InvalidRequest("x".into()));
        assert_eq!(failed.status, 400);
        assert!(!failed.is_success());
    }
}
