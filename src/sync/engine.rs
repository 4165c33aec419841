// ABOUTME: One synchronization pass from source table to remote sheet
// ABOUTME: Introspect, fetch, reconcile header, diff by key, then mutate

use async_trait::async_trait;
use std::sync::Arc;

use super::coordinator::SyncJob;
use super::differ::{diff_records, resolve_dedup_column, SyncPlan};
use super::header::{reconcile_header, HeaderOutcome};
use super::mutator::apply_plan;
use crate::error::SyncError;
use crate::sheets::RemoteSheet;
use crate::source::{SourceTable, TableSchema};

/// Tunables for a sync pass.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Column used as the row identity; overrides the built-in candidates
    pub dedup_column: Option<String>,
    /// Timestamp column used to order rows newest first
    pub order_column: Option<String>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            dedup_column: None,
            order_column: Some("created_at".to_string()),
        }
    }
}

/// Counters for one completed pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    pub total_in_source: usize,
    pub appended: usize,
    pub skipped: usize,
    pub deleted: usize,
    pub warning: Option<String>,
    pub header: Option<HeaderOutcome>,
    pub dedup_column: Option<String>,
}

pub struct SyncEngine {
    source: Arc<dyn SourceTable>,
    sheet: Arc<dyn RemoteSheet>,
    settings: SyncSettings,
}

impl SyncEngine {
    pub fn new(source: Arc<dyn SourceTable>, sheet: Arc<dyn RemoteSheet>, settings: SyncSettings) -> Self {
        Self {
            source,
            sheet,
            settings,
        }
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Run one full reconciliation.
    ///
    /// Every pass re-derives the remote state from scratch, so a failed pass
    /// is repaired by the next one.
    pub async fn sync(&self) -> Result<SyncOutcome, SyncError> {
        let table = self.source.qualified_name();
        let schema = self.source.discover_columns().await?;
        let columns = schema.names();
        tracing::debug!("{} has {} columns: {:?}", table, columns.len(), columns);

        let order_by = resolve_order_column(&schema, self.settings.order_column.as_deref());
        let dedup = resolve_dedup_column(&schema, self.settings.dedup_column.as_deref());

        let records = match &dedup {
            // Deletes need the sheet id; resolve it while rows stream in
            Some(_) => {
                let (records, _) = tokio::try_join!(
                    self.source.fetch_all(&schema, order_by),
                    self.sheet.resolve_sheet_id()
                )?;
                records
            }
            None => self.source.fetch_all(&schema, order_by).await?,
        };
        let total_in_source = records.len();
        tracing::info!("Fetched {} rows from {}", total_in_source, table);

        let header = reconcile_header(self.sheet.as_ref(), &columns).await?;

        let plan = match &dedup {
            Some(column) => {
                let existing = if header.data_preserved() {
                    self.sheet.read_column(column.index).await?
                } else {
                    Vec::new()
                };
                tracing::debug!(
                    "Diffing on '{}' against {} remote keys",
                    column.name,
                    existing.len()
                );
                diff_records(records, column.index, &existing)
            }
            None => {
                tracing::warn!(
                    "No dedup column found in {}; appending all rows without pruning",
                    table
                );
                SyncPlan::append_only(records)
            }
        };

        tracing::debug!(
            "Plan: {} to append, {} to delete, {} skipped",
            plan.to_append.len(),
            plan.to_delete.len(),
            plan.skipped
        );

        let mutation = apply_plan(self.sheet.as_ref(), &plan).await?;

        Ok(SyncOutcome {
            total_in_source,
            appended: mutation.appended,
            skipped: plan.skipped,
            deleted: mutation.deleted,
            warning: mutation.warning,
            header: Some(header),
            dedup_column: dedup.map(|c| c.name),
        })
    }
}

#[async_trait]
impl SyncJob for SyncEngine {
    async fn run_once(&self) -> Result<SyncOutcome, SyncError> {
        self.sync().await
    }
}

/// The configured order column, if it exists in `schema` and holds timestamps.
pub fn resolve_order_column<'a>(
    schema: &TableSchema,
    configured: Option<&'a str>,
) -> Option<&'a str> {
    let column = configured?;
    match schema.column(column) {
        Some(info) if info.kind.is_timestamp() => Some(column),
        Some(info) => {
            tracing::warn!(
                "Order column '{}' is {}, not a timestamp; using table order",
                column,
                info.data_type
            );
            None
        }
        None => None,
    }
}
