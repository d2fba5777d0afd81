//! Server configuration.

/// Routes the server answers to.
///
/// The continuation topic is not configured here; it comes from the
/// engine's pagination settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Route of the create trigger (`POST`).
    pub created_route: String,
    /// Route of the update trigger (`PUT`).
    pub updated_route: String,
    /// Route of the manual resync trigger (`POST`).
    pub manual_route: String,
}

impl ServerConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self {
            created_route: "sync-cl-created".to_string(),
            updated_route: "sync-cl-updated".to_string(),
            manual_route: "sync-cl".to_string(),
        }
    }

    /// Sets the create-trigger route.
    pub fn with_created_route(mut self, route: impl Into<String>) -> Self {
        self.created_route = route.into();
        self
    }

    /// Sets the update-trigger route.
    pub fn with_updated_route(mut self, route: impl Into<String>) -> Self {
        self.updated_route = route.into();
        self
    }

    /// Sets the manual resync route.
    pub fn with_manual_route(mut self, route: impl Into<String>) -> Self {
        self.manual_route = route.into();
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.created_route, "sync-cl-created");
        assert_eq!(config.updated_route, "sync-cl-updated");
        assert_eq!(config.manual_route, "sync-cl");
    }

    #[test]
    fn config_builder() {
        let config = ServerConfig::new()
            .with_created_route("created")
            .with_manual_route("resync");

        assert_eq!(config.created_route, "created");
        assert_eq!(config.manual_route, "resync");
        assert_eq!(config.updated_route, "sync-cl-updated");
    }
}
