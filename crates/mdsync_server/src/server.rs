//! Main sync server.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::{HandlerContext, RequestHandler, TriggerResponse};
use crate::settings::SettingsLoader;
use mdsync_engine::{PageOutcome, ReplicationEngine};
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

/// The sync server.
///
/// Routes trigger requests and continuation events to the replication
/// engine. Transport is left to the embedder: an HTTP framework, a queue
/// consumer or the CLI calls [`SyncServer::handle_request`] and
/// [`SyncServer::handle_event`] directly.
///
/// # Example
///
/// ```
/// use mdsync_engine::{
///     EngineConfig, MemoryConnector, MemoryStore, RecordingDispatcher, ReplicationEngine,
///     SyncSettings,
/// };
/// use mdsync_server::{ServerConfig, StaticSettings, SyncServer};
/// use std::sync::Arc;
///
/// let engine = ReplicationEngine::new(
///     EngineConfig::default(),
///     Arc::new(MemoryStore::new("master")),
///     Arc::new(MemoryConnector::new()),
///     Arc::new(RecordingDispatcher::new()),
/// );
/// let settings = SyncSettings::new("key", "token", vec!["store-b".into()], Vec::new());
/// let server = SyncServer::new(
///     ServerConfig::default(),
///     Arc::new(engine),
///     Arc::new(StaticSettings::new(settings)),
/// );
///
/// // An HTTP layer would call server.handle_request(method, route, body)
/// ```
pub struct SyncServer {
    handler: RequestHandler,
    context: Arc<HandlerContext>,
}

impl SyncServer {
    /// Creates a new sync server.
    pub fn new(
        config: ServerConfig,
        engine: Arc<ReplicationEngine>,
        settings: Arc<dyn SettingsLoader>,
    ) -> Self {
        let context = Arc::new(HandlerContext::new(config, engine, settings));
        let handler = RequestHandler::new(Arc::clone(&context));

        Self { handler, context }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.context.config
    }

    /// Handles a trigger request. Errors become error responses.
    pub async fn handle_request(&self, method: &str, route: &str, body: &[u8]) -> TriggerResponse {
        match self.dispatch(method, route, body).await {
            Ok(response) => response,
            Err(err) => {
                if err.is_client_error() {
                    warn!(method, route, error = %err, "rejected trigger request");
                }
                TriggerResponse::from_error(&err)
            }
        }
    }

    async fn dispatch(&self, method: &str, route: &str, body: &[u8]) -> ServerResult<TriggerResponse> {
        let config = &self.context.config;
        let route = route.trim_matches('/');
        let method = method.to_ascii_uppercase();

        let expected = if route == config.created_route || route == config.manual_route {
            "POST"
        } else if route == config.updated_route {
            "PUT"
        } else {
            return Err(ServerError::UnknownRoute(route.to_string()));
        };
        if method != expected {
            return Err(ServerError::MethodNotAllowed {
                method,
                route: route.to_string(),
            });
        }

        if route == config.created_route {
            self.handler.handle_created(body).await
        } else if route == config.updated_route {
            self.handler.handle_updated(body).await
        } else {
            self.handler.handle_manual_start(body).await
        }
    }

    /// Handles an event from the dispatch channel.
    ///
    /// Only the engine's continuation topic is accepted.
    pub async fn handle_event(&self, topic: &str, payload: Value) -> ServerResult<PageOutcome> {
        if topic != self.context.engine.config().pagination.continuation_topic {
            return Err(ServerError::UnknownRoute(topic.to_string()));
        }
        self.handler.handle_continue(payload).await
    }

    /// Number of create-trigger replications still running.
    pub fn detached_in_flight(&self) -> usize {
        self.context.detached_in_flight()
    }

    /// Waits for every create-trigger replication started so far.
    pub async fn wait_detached(&self) {
        self.context.wait_detached().await;
    }
}
