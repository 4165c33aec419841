// ABOUTME: Applies a SyncPlan to the remote sheet
// ABOUTME: Appends are fatal on failure; deletes degrade to a prune warning

use super::differ::SyncPlan;
use crate::error::SyncError;
use crate::sheets::RemoteSheet;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationOutcome {
    pub appended: usize,
    pub deleted: usize,
    pub warning: Option<String>,
}

pub async fn apply_plan(sheet: &dyn RemoteSheet, plan: &SyncPlan) -> Result<MutationOutcome, SyncError> {
    let mut outcome = MutationOutcome::default();

    if !plan.to_append.is_empty() {
        outcome.appended = sheet.append_rows(&plan.to_append).await?;
        tracing::info!("Appended {} rows", outcome.appended);
    }

    if !plan.to_delete.is_empty() {
        match sheet.delete_rows(&plan.to_delete).await {
            Ok(deleted) => {
                outcome.deleted = deleted;
                tracing::info!("Deleted {} stale rows", deleted);
            }
            Err(e) => {
                let prune = SyncError::PartialPrune {
                    rows: plan.to_delete.len(),
                    message: e.to_string(),
                };
                tracing::warn!("{}", prune);
                outcome.warning = Some(prune.to_string());
            }
        }
    }

    Ok(outcome)
}
