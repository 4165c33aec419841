// ABOUTME: Scheduled sync command
// ABOUTME: Requests a sync every interval until Ctrl-C, then waits for the in-flight run

use anyhow::{bail, Result};
use std::time::Duration;
use tokio::sync::broadcast;

use crate::config::SyncConfig;
use crate::scheduler::SyncScheduler;

pub async fn watch(config: &SyncConfig, interval_secs: u64) -> Result<()> {
    if interval_secs == 0 {
        bail!("--interval must be at least 1 second");
    }

    let coordinator = config.build_coordinator()?;
    let scheduler = SyncScheduler::new(coordinator, Duration::from_secs(interval_secs));

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Ctrl-C received, finishing current sync before exit");
                let _ = shutdown_tx.send(());
            }
            Err(e) => tracing::error!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    println!(
        "Syncing {} into sheet '{}' every {}s (Ctrl-C to stop)",
        config.qualified_table(),
        config.sheet_name,
        interval_secs
    );

    let stats = scheduler.run(shutdown_rx).await;
    println!("Stopped after {} scheduled syncs", stats.ticks);
    Ok(())
}
