//! Configuration for the replication engine.

use crate::error::{SyncError, SyncResult};
use serde::Serialize;
use std::time::Duration;

/// Data entity replicated by default.
pub const DEFAULT_DATA_ENTITY: &str = "CL";

/// Event topic carrying manual-sync continuations.
pub const CONTINUATION_TOPIC: &str = "sync-cl-manual-next";

/// Engine-wide tuning knobs.
///
/// `Default` yields the production constants; tests shrink delays through
/// the builder methods or run on a paused clock.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Data entity documents are read from and written to.
    pub data_entity: String,
    /// Retry configuration for every remote write.
    pub retry: RetryConfig,
    /// Chunking configuration for per-target delivery.
    pub dispatch: DispatchConfig,
    /// Cursor-loop configuration.
    pub pagination: PaginationConfig,
    /// Timeout applied by the transport to each remote call.
    pub request_timeout: Duration,
}

impl EngineConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self {
            data_entity: DEFAULT_DATA_ENTITY.to_string(),
            retry: RetryConfig::default(),
            dispatch: DispatchConfig::default(),
            pagination: PaginationConfig::default(),
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Sets the data entity.
    pub fn with_data_entity(mut self, entity: impl Into<String>) -> Self {
        self.data_entity = entity.into();
        self
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the dispatch configuration.
    pub fn with_dispatch(mut self, dispatch: DispatchConfig) -> Self {
        self.dispatch = dispatch;
        self
    }

    /// Sets the pagination configuration.
    pub fn with_pagination(mut self, pagination: PaginationConfig) -> Self {
        self.pagination = pagination;
        self
    }

    /// Sets the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of attempts, the first one included.
    pub max_attempts: u32,
    /// Delay after the first failed attempt; doubles on each further failure.
    pub initial_delay: Duration,
}

impl RetryConfig {
    /// Creates a new retry configuration.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::from_millis(2000),
        }
    }

    /// Creates a configuration with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
        }
    }

    /// Sets the initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Delay to wait after the given failed attempt (1-indexed):
    /// `initial_delay * 2^(attempt - 1)`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
        self.initial_delay.saturating_mul(factor)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(5)
    }
}

/// Configuration for chunked delivery to one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Documents per chunk; also the bound on concurrent uploads.
    pub chunk_size: usize,
    /// Pause between consecutive chunks.
    pub chunk_delay: Duration,
}

impl DispatchConfig {
    /// Creates a new dispatch configuration.
    pub fn new(chunk_size: usize, chunk_delay: Duration) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            chunk_delay,
        }
    }

    /// Number of inter-chunk pauses needed for `documents` documents.
    pub fn delays_for(&self, documents: usize) -> usize {
        documents.div_ceil(self.chunk_size.max(1)).saturating_sub(1)
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self::new(30, Duration::from_millis(1000))
    }
}

/// Configuration for the self-continuing cursor loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationConfig {
    /// Documents requested per scroll page.
    pub page_size: u32,
    /// Topic continuation messages are sent on.
    pub continuation_topic: String,
}

impl PaginationConfig {
    /// Sets the page size.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Sets the continuation topic.
    pub fn with_continuation_topic(mut self, topic: impl Into<String>) -> Self {
        self.continuation_topic = topic.into();
        self
    }
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            page_size: 1000,
            continuation_topic: CONTINUATION_TOPIC.to_string(),
        }
    }
}

/// Per-invocation replication settings.
///
/// Loaded once at the start of each top-level invocation and never mutated.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSettings {
    /// Application key used against the master and every target.
    pub app_key: String,
    /// Application token paired with `app_key`.
    #[serde(skip_serializing)]
    pub app_token: String,
    /// Target account names, in order. Duplicates are kept.
    pub sub_accounts: Vec<String>,
    /// Field projection requested from the master store.
    pub sync_fields: Vec<String>,
}

impl SyncSettings {
    /// Creates settings from already-split values.
    pub fn new(
        app_key: impl Into<String>,
        app_token: impl Into<String>,
        sub_accounts: Vec<String>,
        sync_fields: Vec<String>,
    ) -> Self {
        Self {
            app_key: app_key.into(),
            app_token: app_token.into(),
            sub_accounts,
            sync_fields,
        }
    }

    /// Returns the shared application credentials.
    pub fn credentials(&self) -> Credentials {
        Credentials {
            app_key: self.app_key.clone(),
            app_token: self.app_token.clone(),
        }
    }

    /// Checks that the credentials are present.
    pub fn validate(&self) -> SyncResult<()> {
        if self.app_key.trim().is_empty() {
            return Err(SyncError::Config("appKey is not set".into()));
        }
        if self.app_token.trim().is_empty() {
            return Err(SyncError::Config("appToken is not set".into()));
        }
        Ok(())
    }
}

impl std::fmt::Debug for SyncSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncSettings")
            .field("app_key", &self.app_key)
            .field("app_token", &"<redacted>")
            .field("sub_accounts", &self.sub_accounts)
            .field("sync_fields", &self.sync_fields)
            .finish()
    }
}

/// Application key/token pair.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Application key.
    pub app_key: String,
    /// Application token.
    pub app_token: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("app_key", &self.app_key)
            .field("app_token", &"<redacted>")
            .finish()
    }
}

/// Splits a comma-separated settings value, trimming items and dropping
/// empty ones.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_config_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.data_entity, "CL");
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.initial_delay, Duration::from_secs(2));
        assert_eq!(config.dispatch.chunk_size, 30);
        assert_eq!(config.dispatch.chunk_delay, Duration::from_secs(1));
        assert_eq!(config.pagination.page_size, 1000);
        assert_eq!(config.pagination.continuation_topic, "sync-cl-manual-next");
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn retry_delay_doubles() {
        let config = RetryConfig::default();
        let delays: Vec<_> = (1..=5).map(|a| config.delay_for_attempt(a)).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8),
                Duration::from_secs(16),
                Duration::from_secs(32),
            ]
        );
        assert_eq!(config.delay_for_attempt(0), Duration::ZERO);
    }

    #[test]
    fn retry_no_retry() {
        let config = RetryConfig::no_retry();
        assert_eq!(config.max_attempts, 1);
        assert_eq!(config.delay_for_attempt(3), Duration::ZERO);
    }

    #[test]
    fn chunk_delay_count() {
        let config = DispatchConfig::default();
        assert_eq!(config.delays_for(0), 0);
        assert_eq!(config.delays_for(1), 0);
        assert_eq!(config.delays_for(30), 0);
        assert_eq!(config.delays_for(31), 1);
        assert_eq!(config.delays_for(95), 3);
    }

    #[test]
    fn zero_chunk_size_is_clamped() {
        let config = DispatchConfig::new(0, Duration::ZERO);
        assert_eq!(config.chunk_size, 1);
    }

    #[test]
    fn split_list_trims_and_drops_empty() {
        assert_eq!(
            split_list(" store-a, store-b ,,store-a "),
            vec!["store-a", "store-b", "store-a"]
        );
        assert!(split_list("").is_empty());
        assert!(split_list(" , ").is_empty());
    }

    #[test]
    fn settings_validation() {
        let settings = SyncSettings::new("key", "token", vec![], vec![]);
        assert!(settings.validate().is_ok());

        let missing = SyncSettings::new("key", " ", vec![], vec![]);
        assert!(matches!(missing.validate(), Err(SyncError::Config(_))));
    }

    #[test]
    fn credentials_debug_redacts_token() {
        let settings = SyncSettings::new("key", "secret-token", vec![], vec![]);
        let debug = format!("{:?}", settings.credentials());
        assert!(debug.contains("key"));
        assert!(!debug.contains("secret-token"));
    }
}
