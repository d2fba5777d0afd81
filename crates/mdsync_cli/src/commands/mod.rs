//! CLI command implementations.

pub mod resync;
pub mod settings;
pub mod sync_one;

use mdsync_engine::{
    AccountConnector, EngineConfig, HttpStore, HttpStoreConfig, ReplicationEngine,
};
use mdsync_server::{
    ChannelDispatcher, EventWorker, FileSettingsLoader, ServerConfig, SettingsLoader, SyncServer,
};
use std::path::Path;
use std::sync::Arc;

/// Result type shared by the commands.
pub type CommandResult<T> = Result<T, Box<dyn std::error::Error>>;

/// A wired engine, server and continuation worker for one account.
pub struct Runtime {
    /// Trigger surface.
    pub server: Arc<SyncServer>,
    /// Engine behind the server.
    pub engine: Arc<ReplicationEngine>,
    /// Settings source.
    pub settings: Arc<FileSettingsLoader>,
    /// Worker draining continuations in process.
    pub worker: EventWorker,
}

impl Runtime {
    /// Connects to `account` with the credentials from `settings_path`.
    pub fn connect(settings_path: &Path, account: &str) -> CommandResult<Self> {
        let settings = Arc::new(FileSettingsLoader::new(settings_path));
        let credentials = settings.load()?.credentials();
        let config = EngineConfig::default();

        let master = HttpStore::new(
            HttpStoreConfig::for_account(account, credentials)
                .with_timeout(config.request_timeout),
        )?;
        let connector = AccountConnector::new(config.request_timeout);
        let (dispatcher, receiver) = ChannelDispatcher::channel();

        let engine = Arc::new(ReplicationEngine::new(
            config,
            Arc::new(master),
            Arc::new(connector),
            Arc::new(dispatcher),
        ));
        let server = Arc::new(SyncServer::new(
            ServerConfig::default(),
            Arc::clone(&engine),
            Arc::clone(&settings) as Arc<dyn SettingsLoader>,
        ));
        let worker = EventWorker::new(Arc::clone(&server), receiver);

        Ok(Self {
            server,
            engine,
            settings,
            worker,
        })
    }
}
