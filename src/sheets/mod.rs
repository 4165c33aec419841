// ABOUTME: Remote sheet adapter used as the sync sink
// ABOUTME: RemoteSheet trait, row-deletion planning and cell normalisation

pub mod auth;
pub mod client;
pub mod memory;
pub mod models;

pub use auth::{ServiceAccountAuth, ServiceAccountKey, StaticToken, TokenSource};
pub use client::SheetsClient;
pub use memory::MemorySheet;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::error::SyncError;
use crate::source::CellValue;
use crate::source::value::format_float;

/// Internal numeric identifier of a sheet (tab) inside a spreadsheet.
pub type SheetId = i64;

/// Thin client over a remote, schema-less tabular store.
///
/// Row 1 holds the header; data rows start at row 2. Row numbers are
/// 1-based, as the sheet displays them. No method retries internally: a
/// failed run is repaired by the next one.
#[async_trait]
pub trait RemoteSheet: Send + Sync {
    /// Row 1, or an empty list when the sheet has no data.
    async fn read_header(&self) -> Result<Vec<String>, SyncError>;

    /// Overwrite row 1 only.
    async fn write_header(&self, columns: &[String]) -> Result<(), SyncError>;

    /// Wipe every cell in the sheet.
    async fn clear_all(&self) -> Result<(), SyncError>;

    /// Non-blank cells of a zero-based column below the header, with their row numbers.
    async fn read_column(&self, index: usize) -> Result<Vec<(u32, String)>, SyncError>;

    /// Append rows after the last row, preserving order. Returns rows written.
    async fn append_rows(&self, rows: &[Vec<CellValue>]) -> Result<usize, SyncError>;

    /// Delete rows by 1-based number in one structural batch. Returns rows removed.
    ///
    /// Callers may pass numbers in any order; see [`plan_row_deletions`].
    async fn delete_rows(&self, row_numbers: &[u32]) -> Result<usize, SyncError>;

    /// Resolve the sheet's internal id, required by structural deletes.
    async fn resolve_sheet_id(&self) -> Result<SheetId, SyncError>;
}

/// Half-open, zero-based row range `[start, end)` removed by one delete request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowSpan {
    pub start: u32,
    pub end: u32,
}

impl RowSpan {
    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }
}

/// Turn 1-based row numbers into delete ranges, bottom of the sheet first.
///
/// Rows are deduplicated, the header row (1) and row 0 are ignored, and
/// contiguous rows are merged. Deleting from the bottom up keeps the row
/// numbers of the remaining spans valid while the batch is applied.
pub fn plan_row_deletions(row_numbers: &[u32]) -> Vec<RowSpan> {
    let mut rows: Vec<u32> = row_numbers.iter().copied().filter(|&r| r >= 2).collect();
    rows.sort_unstable_by(|a, b| b.cmp(a));
    rows.dedup();

    let mut spans: Vec<RowSpan> = Vec::new();
    for row in rows {
        let index = row - 1;
        match spans.last_mut() {
            Some(span) if span.start == index + 1 => span.start = index,
            _ => spans.push(RowSpan {
                start: index,
                end: index + 1,
            }),
        }
    }
    spans
}

/// Text form of a cell read back from the sheet, comparable with
/// [`CellValue::key_text`].
pub fn cell_text(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => String::new(),
        JsonValue::String(s) => s.trim().to_string(),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => i.to_string(),
            None => n.as_f64().map(format_float).unwrap_or_else(|| n.to_string()),
        },
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_row_deletions_descending_and_merged() {
        let spans = plan_row_deletions(&[3, 7, 4, 5, 10]);
        assert_eq!(
            spans,
            vec![
                RowSpan { start: 9, end: 10 },
                RowSpan { start: 6, end: 7 },
                RowSpan { start: 2, end: 5 },
            ]
        );
        assert_eq!(spans.iter().map(RowSpan::len).sum::<u32>(), 5);
    }

    #[test]
    fn test_plan_row_deletions_skips_header_and_duplicates() {
        let spans = plan_row_deletions(&[1, 0, 2, 2, 3]);
        assert_eq!(spans, vec![RowSpan { start: 1, end: 3 }]);
        assert!(plan_row_deletions(&[]).is_empty());
        assert!(plan_row_deletions(&[1]).is_empty());
    }

    #[test]
    fn test_cell_text_normalises_numbers() {
        assert_eq!(cell_text(&serde_json::json!(100)), "100");
        assert_eq!(cell_text(&serde_json::json!(100.0)), "100");
        assert_eq!(cell_text(&serde_json::json!(2.5)), "2.5");
        assert_eq!(cell_text(&serde_json::json!(" B1 ")), "B1");
        assert_eq!(cell_text(&serde_json::json!(true)), "true");
        assert_eq!(cell_text(&JsonValue::Null), "");
    }

    #[test]
    fn test_cell_text_agrees_with_key_text() {
        for value in [
            CellValue::Integer(42),
            CellValue::Float(12.75),
            CellValue::Float(300.0),
            CellValue::Text("BK-001".to_string()),
            CellValue::Bool(false),
        ] {
            assert_eq!(Some(cell_text(&value.to_json())), value.key_text());
        }
    }

    #[test]
    fn test_snowflake_keys_survive_sheet_number_storage() {
        let value = CellValue::Integer(9_007_199_254_740_993);
        let sent = value.to_json();

        // Whatever the sheet stores must read back as the same key
        let stored = match &sent {
            JsonValue::Number(n) => serde_json::json!(n.as_f64().unwrap_or_default()),
            other => other.clone(),
        };
        assert_eq!(Some(cell_text(&stored)), value.key_text());
    }
}
