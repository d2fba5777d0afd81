//! Error types for the sync server.

use mdsync_engine::SyncError;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur while handling a trigger or event.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Malformed payload.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// No handler for the route or topic.
    #[error("unknown route: {0}")]
    UnknownRoute(String),

    /// The route exists but not for this method.
    #[error("method {method} not allowed on {route}")]
    MethodNotAllowed {
        /// Method received.
        method: String,
        /// Route addressed.
        route: String,
    },

    /// Settings could not be loaded.
    #[error("settings error: {0}")]
    Settings(String),

    /// Replication failed.
    #[error("sync failed: {0}")]
    Engine(#[from] SyncError),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Response status for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ServerError::InvalidRequest(_) => 400,
            ServerError::UnknownRoute(_) => 404,
            ServerError::MethodNotAllowed { .. } => 405,
            ServerError::Settings(_) | ServerError::Engine(_) | ServerError::Internal(_) => 500,
        }
    }

    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }
}
