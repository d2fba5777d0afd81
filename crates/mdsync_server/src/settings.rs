//! Settings loading.
//!
//! Settings are read once at the start of every trigger or event and passed
//! down explicitly; nothing caches them between invocations.

use crate::error::{ServerError, ServerResult};
use mdsync_engine::{split_list, SyncSettings};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Source of per-invocation settings.
pub trait SettingsLoader: Send + Sync {
    /// Loads the current settings.
    fn load(&self) -> ServerResult<SyncSettings>;
}

/// Settings as stored: list values are single comma-separated strings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSettings {
    /// Application key.
    #[serde(default)]
    pub app_key: String,
    /// Application token.
    #[serde(default)]
    pub app_token: String,
    /// Comma-separated target accounts.
    #[serde(default)]
    pub sub_accounts: String,
    /// Comma-separated field projection.
    #[serde(default)]
    pub sync_fields: String,
}

impl RawSettings {
    /// Parses raw settings from JSON text.
    pub fn from_json(text: &str) -> ServerResult<Self> {
        serde_json::from_str(text)
            .map_err(|e| ServerError::Settings(format!("malformed settings: {}", e)))
    }

    /// Splits the list values and checks the credentials.
    pub fn into_settings(self) -> ServerResult<SyncSettings> {
        let settings = SyncSettings::new(
            self.app_key.trim(),
            self.app_token.trim(),
            split_list(&self.sub_accounts),
            split_list(&self.sync_fields),
        );
        settings
            .validate()
            .map_err(|e| ServerError::Settings(e.to_string()))?;
        Ok(settings)
    }
}

/// Re-reads a JSON settings file on every load.
#[derive(Debug, Clone)]
pub struct FileSettingsLoader {
    path: PathBuf,
}

impl FileSettingsLoader {
    /// Creates a loader for `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the settings file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsLoader for FileSettingsLoader {
    fn load(&self) -> ServerResult<SyncSettings> {
        let text = std::fs::read_to_string(&self.path).map_err(|e| {
            ServerError::Settings(format!("cannot read {}: {}", self.path.display(), e))
        })?;
        RawSettings::from_json(&text)?.into_settings()
    }
}

/// Serves a fixed settings value.
#[derive(Debug, Clone)]
pub struct StaticSettings(SyncSettings);

impl StaticSettings {
    /// Wraps `settings`.
    pub fn new(settings: SyncSettings) -> Self {
        Self(settings)
    }
}

impl SettingsLoader for StaticSettings {
    fn load(&self) -> ServerResult<SyncSettings> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn lists_are_split_and_trimmed() {
        let raw = RawSettings::from_json(
            r#"{"appKey":"key","appToken":"token","subAccounts":" b, ,c,b ","syncFields":"id,email,"}"#,
        )
        .unwrap();
        let settings = raw.into_settings().unwrap();

        assert_eq!(settings.sub_accounts, vec!["b", "c", "b"]);
        assert_eq!(settings.sync_fields, vec!["id", "email"]);
    }

    #[test]
    fn missing_credentials_are_rejected() {
        let raw = RawSettings::from_json(r#"{"appKey":"key","subAccounts":"b"}"#).unwrap();
        assert!(matches!(raw.into_settings(), Err(ServerError::Settings(_))));
    }

    #[test]
    fn file_is_reread_on_every_load() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"appKey":"k","appToken":"t","subAccounts":"b"}}"#).unwrap();
        let loader = FileSettingsLoader::new(file.path());
        assert_eq!(loader.load().unwrap().sub_accounts, vec!["b"]);

        std::fs::write(
            file.path(),
            r#"{"appKey":"k","appToken":"t","subAccounts":"b,c"}"#,
        )
        .unwrap();
        assert_eq!(loader.load().unwrap().sub_accounts, vec!["b", "c"]);
    }

    #[test]
    fn unreadable_file_is_a_settings_error() {
        let dir = tempfile::tempdir().unwrap();
        let loader = FileSettingsLoader::new(dir.path().join("missing.json"));
        assert!(matches!(loader.load(), Err(ServerError::Settings(_))));

        std::fs::write(dir.path().join("bad.json"), "not json").unwrap();
        let loader = FileSettingsLoader::new(dir.path().join("bad.json"));
        assert!(matches!(loader.load(), Err(ServerError::Settings(_))));
    }
}
