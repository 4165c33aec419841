// ABOUTME: Reconciliation pipeline between the source table and the remote sheet
// ABOUTME: Header check, key diff and batch mutation run under a single-flight coordinator

pub mod coordinator;
pub mod differ;
pub mod engine;
pub mod header;
pub mod mutator;

pub use coordinator::{SyncCoordinator, SyncHandle, SyncJob, SyncResult};
pub use differ::{diff_records, resolve_dedup_column, DedupColumn, SyncPlan};
pub use engine::{SyncEngine, SyncOutcome, SyncSettings};
pub use header::{reconcile_header, HeaderOutcome};
pub use mutator::{apply_plan, MutationOutcome};
