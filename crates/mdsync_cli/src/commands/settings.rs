//! Settings command implementation.

use super::CommandResult;
use mdsync_engine::SyncSettings;
use mdsync_server::{FileSettingsLoader, SettingsLoader};
use serde::Serialize;
use std::path::Path;

/// Printable view of the settings. The token is never shown.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsView<'a> {
    /// Settings file.
    pub path: String,
    /// Application key.
    pub app_key: &'a str,
    /// Always `<redacted>`.
    pub app_token: &'static str,
    /// Parsed target accounts.
    pub sub_accounts: &'a [String],
    /// Parsed field projection; empty means every field.
    pub sync_fields: &'a [String],
}

impl<'a> SettingsView<'a> {
    /// Builds the view for settings loaded from `path`.
    pub fn new(path: &Path, settings: &'a SyncSettings) -> Self {
        Self {
            path: path.display().to_string(),
            app_key: &settings.app_key,
            app_token: "<redacted>",
            sub_accounts: &settings.sub_accounts,
            sync_fields: &settings.sync_fields,
        }
    }
}

/// Runs the settings command.
pub fn run(path: &Path, format: &str) -> CommandResult<()> {
    let settings = FileSettingsLoader::new(path).load()?;
    let view = SettingsView::new(path, &settings);

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        println!("Settings: {}", view.path);
        println!("  App key:      {}", view.app_key);
        println!("  App token:    {}", view.app_token);
        println!("  Sub-accounts: {}", view.sub_accounts.join(", "));
        if view.sync_fields.is_empty() {
            println!("  Sync fields:  (all)");
        } else {
            println!("  Sync fields:  {}", view.sync_fields.join(", "));
        }
    }

    Ok(())
}
