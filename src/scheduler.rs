// ABOUTME: Interval trigger that requests sync runs from the coordinator
// ABOUTME: Ticks during a run coalesce; shutdown waits for the in-flight run

use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};

use crate::sync::SyncCoordinator;

/// Statistics from a scheduler session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Number of ticks that requested a sync
    pub ticks: u64,
    /// Ticks that found a run already in flight and were folded into a rerun
    pub coalesced: u64,
}

/// Periodically requests a sync until shut down.
pub struct SyncScheduler {
    coordinator: SyncCoordinator,
    period: Duration,
}

impl SyncScheduler {
    pub fn new(coordinator: SyncCoordinator, period: Duration) -> Self {
        Self {
            coordinator,
            period: period.max(Duration::from_millis(1)),
        }
    }

    /// Run until `shutdown` fires, then wait for any in-flight run to finish.
    ///
    /// The first tick fires immediately.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) -> SchedulerStats {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut stats = SchedulerStats::default();
        let mut listening = true;

        tracing::info!("Starting scheduled sync every {:?}", self.period);

        loop {
            tokio::select! {
                biased;

                received = shutdown.recv(), if listening => match received {
                    Err(broadcast::error::RecvError::Closed) => {
                        // Sender gone without a signal; keep syncing
                        tracing::warn!("Shutdown channel closed, scheduler will run until killed");
                        listening = false;
                    }
                    _ => {
                        tracing::info!("Shutdown signal received, stopping scheduler");
                        break;
                    }
                },
                _ = ticker.tick() => {
                    stats.ticks += 1;
                    if self.coordinator.is_running() {
                        stats.coalesced += 1;
                        tracing::debug!("Tick {} joined the in-flight sync run", stats.ticks);
                    }
                    // Result is logged by the coordinator
                    drop(self.coordinator.request());
                }
            }
        }

        if self.coordinator.is_running() {
            tracing::info!("Waiting for the in-flight sync run to finish");
        }
        self.coordinator.wait_idle().await;

        tracing::info!(
            "Scheduler stopped after {} ticks ({} coalesced)",
            stats.ticks,
            stats.coalesced
        );
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use crate::sync::{SyncJob, SyncOutcome};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct SlowJob {
        runs: AtomicUsize,
        delay: Duration,
    }

    #[async_trait]
    impl SyncJob for SlowJob {
        async fn run_once(&self) -> Result<SyncOutcome, SyncError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(SyncOutcome::default())
        }
    }

    #[tokio::test]
    async fn test_ticks_request_runs_and_shutdown_waits() {
        let job = Arc::new(SlowJob {
            runs: AtomicUsize::new(0),
            delay: Duration::from_millis(5),
        });
        let coordinator = SyncCoordinator::new(job.clone());
        let scheduler = SyncScheduler::new(coordinator.clone(), Duration::from_millis(20));
        let (tx, rx) = broadcast::channel(1);

        let handle = tokio::spawn(async move { scheduler.run(rx).await });
        tokio::time::sleep(Duration::from_millis(70)).await;
        tx.send(()).unwrap();
        let stats = handle.await.unwrap();

        assert!(stats.ticks >= 2, "{stats:?}");
        assert!(job.runs.load(Ordering::SeqCst) >= 2);
        assert!(!coordinator.is_running());
    }

    #[tokio::test]
    async fn test_ticks_during_long_run_coalesce() {
        let job = Arc::new(SlowJob {
            runs: AtomicUsize::new(0),
            delay: Duration::from_millis(200),
        });
        let coordinator = SyncCoordinator::new(job.clone());
        let scheduler = SyncScheduler::new(coordinator.clone(), Duration::from_millis(10));
        let (tx, rx) = broadcast::channel(1);

        let handle = tokio::spawn(async move { scheduler.run(rx).await });
        tokio::time::sleep(Duration::from_millis(80)).await;
        tx.send(()).unwrap();
        let stats = handle.await.unwrap();

        // One run in flight the whole time plus a single coalesced rerun
        assert!(stats.coalesced >= 1, "{stats:?}");
        assert_eq!(job.runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_closed_shutdown_channel_keeps_ticking() {
        let job = Arc::new(SlowJob {
            runs: AtomicUsize::new(0),
            delay: Duration::from_millis(1),
        });
        let coordinator = SyncCoordinator::new(job.clone());
        let scheduler = SyncScheduler::new(coordinator, Duration::from_millis(10));
        let (tx, rx) = broadcast::channel::<()>(1);
        drop(tx);

        let stopped = tokio::time::timeout(Duration::from_millis(80), scheduler.run(rx)).await;

        assert!(stopped.is_err(), "scheduler exited on a closed channel");
        assert!(job.runs.load(Ordering::SeqCst) >= 2);
    }
}
