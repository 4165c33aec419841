// ABOUTME: Keeps the remote header row in step with the source schema
// ABOUTME: Any shape mismatch wipes the sheet and rewrites the header

use crate::error::SyncError;
use crate::sheets::RemoteSheet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderOutcome {
    /// The sheet was empty and received its first header
    Created,
    /// The header already matched
    Unchanged,
    /// The header drifted; the sheet was cleared before rewriting it
    Rewritten,
}

impl HeaderOutcome {
    /// Whether existing data rows survived reconciliation.
    pub fn data_preserved(&self) -> bool {
        matches!(self, HeaderOutcome::Unchanged)
    }
}

/// Compare the remote header with `columns` and repair it.
///
/// After this returns `Ok`, row 1 equals `columns` exactly. On drift every
/// data row is lost; the caller re-appends them from the source.
pub async fn reconcile_header(
    sheet: &dyn RemoteSheet,
    columns: &[String],
) -> Result<HeaderOutcome, SyncError> {
    let current = sheet.read_header().await?;

    if current.is_empty() {
        tracing::info!("Remote sheet is empty, writing header ({} columns)", columns.len());
        sheet.write_header(columns).await?;
        return Ok(HeaderOutcome::Created);
    }

    if current.as_slice() == columns {
        tracing::debug!("Remote header matches source schema");
        return Ok(HeaderOutcome::Unchanged);
    }

    tracing::warn!(
        "Schema drift detected: remote header {:?} does not match source columns {:?}; clearing sheet",
        current,
        columns
    );
    sheet.clear_all().await?;
    sheet.write_header(columns).await?;
    Ok(HeaderOutcome::Rewritten)
}

/// Describe how `remote` differs from `columns`, or `None` when they match.
pub fn describe_drift(remote: &[String], columns: &[String]) -> Option<String> {
    if remote == columns {
        return None;
    }
    if remote.is_empty() {
        return Some("remote sheet has no header".to_string());
    }

    let missing: Vec<&str> = columns
        .iter()
        .filter(|c| !remote.contains(c))
        .map(String::as_str)
        .collect();
    let extra: Vec<&str> = remote
        .iter()
        .filter(|c| !columns.contains(c))
        .map(String::as_str)
        .collect();

    let mut parts = Vec::new();
    if !missing.is_empty() {
        parts.push(format!("missing columns: {}", missing.join(", ")));
    }
    if !extra.is_empty() {
        parts.push(format!("extra columns: {}", extra.join(", ")));
    }
    if parts.is_empty() {
        parts.push("column order differs".to_string());
    }
    Some(parts.join("; "))
}
