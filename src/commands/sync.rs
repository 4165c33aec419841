// ABOUTME: One-shot sync command
// ABOUTME: Runs a single reconciliation through the coordinator and prints the JSON result

use anyhow::{bail, Context, Result};

use crate::config::SyncConfig;

pub async fn sync(config: &SyncConfig) -> Result<()> {
    tracing::info!(
        "Syncing {} into sheet '{}'",
        config.qualified_table(),
        config.sheet_name
    );

    let coordinator = config.build_coordinator()?;
    let result = coordinator.request_sync().await;
    coordinator.wait_idle().await;

    let json = serde_json::to_string_pretty(&result).context("Failed to serialize sync result")?;
    println!("{}", json);

    if let Some(warning) = &result.warning {
        tracing::warn!("{}", warning);
    }
    if !result.success {
        bail!(
            "Sync failed: {}",
            result.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}
