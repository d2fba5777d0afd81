//! Resync command implementation.

use super::{CommandResult, Runtime};
use serde_json::json;
use std::path::Path;
use tracing::info;

/// Runs the resync command.
///
/// Starts a manual resync through the trigger surface and then handles
/// every continuation in process until the cursor loop finishes.
pub async fn run(settings_path: &Path, account: &str, since: Option<String>) -> CommandResult<()> {
    let mut runtime = Runtime::connect(settings_path, account)?;
    let route = runtime.server.config().manual_route.clone();
    let body = match since {
        Some(date) => json!({ "syncDate": date }),
        None => json!({}),
    };

    let response = runtime
        .server
        .handle_request("POST", &route, body.to_string().as_bytes())
        .await;
    if !response.is_success() {
        return Err(format!("resync rejected ({}): {}", response.status, response.body).into());
    }

    let stats = runtime.worker.run_until_idle().await;
    info!(pages = stats.handled, failed = stats.failed, "resync worker idle");
    println!("Pages handled: {}", stats.handled);
    if stats.failed > 0 {
        return Err(format!("resync stalled after {} page(s)", stats.handled).into());
    }
    Ok(())
}
