// ABOUTME: Single-flight coordination of sync runs
// ABOUTME: Concurrent requests share one in-flight run and coalesce into at most one rerun

use async_trait::async_trait;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use serde::Serialize;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use super::engine::SyncOutcome;
use crate::error::SyncError;

/// One full reconciliation pass, as run by the coordinator.
#[async_trait]
pub trait SyncJob: Send + Sync {
    async fn run_once(&self) -> Result<SyncOutcome, SyncError>;
}

/// Result handed to every caller attached to a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    pub success: bool,
    pub total_in_source: usize,
    pub appended: usize,
    pub skipped: usize,
    pub deleted: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    pub run_id: u64,
    pub duration_ms: u64,
}

impl SyncResult {
    fn completed(run_id: u64, outcome: SyncOutcome, duration_ms: u64) -> Self {
        Self {
            success: true,
            total_in_source: outcome.total_in_source,
            appended: outcome.appended,
            skipped: outcome.skipped,
            deleted: outcome.deleted,
            error: None,
            warning: outcome.warning,
            run_id,
            duration_ms,
        }
    }

    fn failed(run_id: u64, error: String, duration_ms: u64) -> Self {
        Self {
            success: false,
            total_in_source: 0,
            appended: 0,
            skipped: 0,
            deleted: 0,
            error: Some(error),
            warning: None,
            run_id,
            duration_ms,
        }
    }
}

/// Cloneable future resolving to the result of the run it is attached to.
pub type SyncHandle = Shared<BoxFuture<'static, SyncResult>>;

#[derive(Default)]
struct CoordinatorState {
    in_flight: Option<SyncHandle>,
    rerun_requested: bool,
}

struct Inner {
    job: Arc<dyn SyncJob>,
    state: Mutex<CoordinatorState>,
    next_run_id: AtomicU64,
}

/// Serialises sync runs.
///
/// At most one run executes at a time. A request arriving while a run is in
/// flight attaches to that run and marks a rerun; however many requests
/// arrive, exactly one follow-up run starts once the current one finishes, so
/// changes committed mid-run are picked up.
#[derive(Clone)]
pub struct SyncCoordinator {
    inner: Arc<Inner>,
}

impl SyncCoordinator {
    pub fn new(job: Arc<dyn SyncJob>) -> Self {
        Self {
            inner: Arc::new(Inner {
                job,
                state: Mutex::new(CoordinatorState::default()),
                next_run_id: AtomicU64::new(0),
            }),
        }
    }

    /// Request a sync and wait for the result of the run this request joined.
    pub async fn request_sync(&self) -> SyncResult {
        self.request().await
    }

    /// Register a request without waiting.
    ///
    /// Must be called from within a tokio runtime.
    pub fn request(&self) -> SyncHandle {
        let mut state = self.inner.lock();

        if let Some(handle) = state.in_flight.clone() {
            tracing::debug!("Sync already running, scheduling a rerun");
            state.rerun_requested = true;
            return handle;
        }

        let handle = Inner::launch(&self.inner);
        state.in_flight = Some(handle.clone());
        handle
    }

    /// Wait until no run is in flight, follow-up reruns included.
    pub async fn wait_idle(&self) {
        loop {
            let in_flight = self.inner.lock().in_flight.clone();
            match in_flight {
                Some(handle) => {
                    handle.await;
                }
                None => return,
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock().in_flight.is_some()
    }

    /// Number of runs started so far.
    pub fn runs_started(&self) -> u64 {
        self.inner.next_run_id.load(Ordering::SeqCst)
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, CoordinatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawn a run. The caller must hold the state lock and install the
    /// returned handle as the in-flight run.
    fn launch(inner: &Arc<Inner>) -> SyncHandle {
        let run_id = inner.next_run_id.fetch_add(1, Ordering::SeqCst) + 1;
        let task_inner = Arc::clone(inner);

        let task = tokio::spawn(async move {
            tracing::info!("Sync run {} started", run_id);
            let started = Instant::now();

            let outcome = AssertUnwindSafe(task_inner.job.run_once())
                .catch_unwind()
                .await;
            let duration_ms = started.elapsed().as_millis() as u64;

            let result = match outcome {
                Ok(Ok(outcome)) => SyncResult::completed(run_id, outcome, duration_ms),
                Ok(Err(e)) => SyncResult::failed(run_id, format!("{:#}", e), duration_ms),
                Err(panic) => SyncResult::failed(
                    run_id,
                    format!("sync run panicked: {}", panic_message(panic.as_ref())),
                    duration_ms,
                ),
            };

            match &result.error {
                None => tracing::info!(
                    "Sync run {} finished in {}ms: {} in source, {} appended, {} skipped, {} deleted",
                    run_id,
                    duration_ms,
                    result.total_in_source,
                    result.appended,
                    result.skipped,
                    result.deleted
                ),
                Some(error) => tracing::error!("Sync run {} failed: {}", run_id, error),
            }

            task_inner.finish(run_id);
            result
        });

        async move {
            match task.await {
                Ok(result) => result,
                Err(e) => SyncResult::failed(run_id, format!("sync task aborted: {}", e), 0),
            }
        }
        .boxed()
        .shared()
    }

    /// Clear the in-flight slot and start the coalesced rerun, if any, before
    /// the finished run's result is published.
    fn finish(self: &Arc<Self>, run_id: u64) {
        let mut state = self.lock();
        state.in_flight = None;

        if state.rerun_requested {
            state.rerun_requested = false;
            tracing::info!("Changes requested during sync run {}, starting a rerun", run_id);
            let next = Inner::launch(self);
            state.in_flight = Some(next);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Semaphore;

    /// Job that blocks until released and records concurrency.
    struct GatedJob {
        gate: Semaphore,
        runs: AtomicUsize,
        active: AtomicUsize,
        max_active: AtomicUsize,
        fail: bool,
    }

    impl GatedJob {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                gate: Semaphore::new(0),
                runs: AtomicUsize::new(0),
                active: AtomicUsize::new(0),
                max_active: AtomicUsize::new(0),
                fail,
            })
        }

        fn release(&self, runs: usize) {
            self.gate.add_permits(runs);
        }

        fn runs(&self) -> usize {
            self.runs.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SyncJob for GatedJob {
        async fn run_once(&self) -> Result<SyncOutcome, SyncError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now, Ordering::SeqCst);
            self.runs.fetch_add(1, Ordering::SeqCst);

            let permit = self.gate.acquire().await.map_err(|e| SyncError::Config(e.to_string()))?;
            permit.forget();
            self.active.fetch_sub(1, Ordering::SeqCst);

            if self.fail {
                return Err(SyncError::remote_status("append rows", 503, "backend unavailable"));
            }
            Ok(SyncOutcome {
                total_in_source: 2,
                appended: 2,
                ..SyncOutcome::default()
            })
        }
    }

    struct PanickingJob;

    #[async_trait]
    impl SyncJob for PanickingJob {
        async fn run_once(&self) -> Result<SyncOutcome, SyncError> {
            panic!("boom");
        }
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_run_and_coalesce() {
        let job = GatedJob::new(false);
        let coordinator = SyncCoordinator::new(job.clone());

        let handles: Vec<_> = (0..5).map(|_| coordinator.request()).collect();
        assert!(coordinator.is_running());
        job.release(2);

        let results = futures::future::join_all(handles).await;
        for result in &results {
            assert!(result.success);
            assert_eq!(result.run_id, 1);
            assert_eq!(result.appended, 2);
        }

        coordinator.wait_idle().await;
        assert_eq!(job.runs(), 2);
        assert_eq!(coordinator.runs_started(), 2);
        assert_eq!(job.max_active.load(Ordering::SeqCst), 1);
        assert!(!coordinator.is_running());
    }

    #[tokio::test]
    async fn test_single_request_runs_once() {
        let job = GatedJob::new(false);
        job.release(1);
        let coordinator = SyncCoordinator::new(job.clone());

        let result = coordinator.request_sync().await;
        coordinator.wait_idle().await;

        assert!(result.success);
        assert_eq!(job.runs(), 1);
    }

    #[tokio::test]
    async fn test_requests_after_completion_start_new_runs() {
        let job = GatedJob::new(false);
        job.release(2);
        let coordinator = SyncCoordinator::new(job.clone());

        let first = coordinator.request_sync().await;
        let second = coordinator.request_sync().await;

        assert_eq!(first.run_id, 1);
        assert_eq!(second.run_id, 2);
        assert_eq!(job.runs(), 2);
    }

    #[tokio::test]
    async fn test_failure_reaches_every_waiter_and_still_reruns() {
        let job = GatedJob::new(true);
        let coordinator = SyncCoordinator::new(job.clone());

        let a = coordinator.request();
        let b = coordinator.request();
        job.release(2);

        let (a, b) = futures::join!(a, b);
        assert_eq!(a, b);
        assert!(!a.success);
        assert!(a.error.as_deref().unwrap().contains("HTTP 503"));

        coordinator.wait_idle().await;
        assert_eq!(job.runs(), 2);
    }

    #[tokio::test]
    async fn test_panicking_run_fails_without_wedging() {
        let coordinator = SyncCoordinator::new(Arc::new(PanickingJob));

        let result = coordinator.request_sync().await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("boom"));

        let again = coordinator.request_sync().await;
        assert_eq!(again.run_id, 2);
        assert!(!coordinator.is_running());
    }

    #[test]
    fn test_result_json_shape() {
        let result = SyncResult::completed(
            7,
            SyncOutcome {
                total_in_source: 3,
                appended: 1,
                skipped: 2,
                ..SyncOutcome::default()
            },
            15,
        );
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "success": true,
                "totalInSource": 3,
                "appended": 1,
                "skipped": 2,
                "deleted": 0,
                "runId": 7,
                "durationMs": 15
            })
        );
    }
}
