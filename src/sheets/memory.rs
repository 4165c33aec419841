// ABOUTME: In-process RemoteSheet that stores cells as JSON values
// ABOUTME: Mirrors the Sheets API's append/delete semantics for tests and dry runs

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{cell_text, plan_row_deletions, RemoteSheet, SheetId};
use crate::error::SyncError;
use crate::source::CellValue;

/// A sheet held in memory. Row 0 of `rows` is sheet row 1 (the header).
#[derive(Default)]
pub struct MemorySheet {
    rows: Mutex<Vec<Vec<JsonValue>>>,
    fail_deletes: AtomicBool,
    fail_appends: AtomicBool,
    clear_calls: AtomicUsize,
    append_calls: AtomicUsize,
    delete_calls: AtomicUsize,
}

impl MemorySheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from existing content, header first.
    pub fn with_rows(rows: Vec<Vec<JsonValue>>) -> Self {
        Self {
            rows: Mutex::new(rows),
            ..Self::default()
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Vec<JsonValue>>> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every following `delete_rows` call fail.
    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Make every following `append_rows` call fail.
    pub fn fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    /// Header cells as text.
    pub fn header(&self) -> Vec<String> {
        self.lock()
            .first()
            .map(|row| row.iter().map(cell_text).collect())
            .unwrap_or_default()
    }

    /// Data rows (below the header) as text.
    pub fn data_rows(&self) -> Vec<Vec<String>> {
        self.lock()
            .iter()
            .skip(1)
            .map(|row| row.iter().map(cell_text).collect())
            .collect()
    }

    /// Text of one column across the data rows, blanks included.
    pub fn column_values(&self, index: usize) -> Vec<String> {
        self.lock()
            .iter()
            .skip(1)
            .map(|row| row.get(index).map(cell_text).unwrap_or_default())
            .collect()
    }

    pub fn data_row_count(&self) -> usize {
        self.lock().len().saturating_sub(1)
    }

    pub fn clear_calls(&self) -> usize {
        self.clear_calls.load(Ordering::SeqCst)
    }

    pub fn append_calls(&self) -> usize {
        self.append_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    /// Overwrite a raw row directly, growing the sheet if needed.
    pub fn put_row(&self, row_number: usize, cells: Vec<JsonValue>) {
        let mut rows = self.lock();
        let idx = row_number.saturating_sub(1);
        if rows.len() <= idx {
            rows.resize(idx + 1, Vec::new());
        }
        rows[idx] = cells;
    }
}

#[async_trait]
impl RemoteSheet for MemorySheet {
    async fn read_header(&self) -> Result<Vec<String>, SyncError> {
        let mut header = self.header();
        while header.last().is_some_and(|cell| cell.is_empty()) {
            header.pop();
        }
        Ok(header)
    }

    async fn write_header(&self, columns: &[String]) -> Result<(), SyncError> {
        let cells = columns.iter().cloned().map(JsonValue::String).collect();
        let mut rows = self.lock();
        if rows.is_empty() {
            rows.push(cells);
        } else {
            rows[0] = cells;
        }
        Ok(())
    }

    async fn clear_all(&self) -> Result<(), SyncError> {
        self.clear_calls.fetch_add(1, Ordering::SeqCst);
        self.lock().clear();
        Ok(())
    }

    async fn read_column(&self, index: usize) -> Result<Vec<(u32, String)>, SyncError> {
        Ok(self
            .column_values(index)
            .into_iter()
            .enumerate()
            .map(|(offset, text)| (offset as u32 + 2, text))
            .filter(|(_, text)| !text.is_empty())
            .collect())
    }

    async fn append_rows(&self, rows: &[Vec<CellValue>]) -> Result<usize, SyncError> {
        self.append_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(SyncError::remote_status(
                "append rows",
                500,
                "injected append failure",
            ));
        }

        let mut sheet = self.lock();
        if sheet.is_empty() {
            // Appending to a blank sheet starts at row 1
            sheet.push(Vec::new());
        }
        for row in rows {
            sheet.push(row.iter().map(CellValue::to_json).collect());
        }
        Ok(rows.len())
    }

    async fn delete_rows(&self, row_numbers: &[u32]) -> Result<usize, SyncError> {
        let spans = plan_row_deletions(row_numbers);
        if spans.is_empty() {
            return Ok(0);
        }

        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(SyncError::remote_status(
                "delete rows",
                429,
                "injected delete failure",
            ));
        }

        let mut sheet = self.lock();
        let mut removed = 0usize;
        for span in spans {
            let start = span.start as usize;
            let end = (span.end as usize).min(sheet.len());
            if start < end {
                sheet.drain(start..end);
                removed += end - start;
            }
        }
        Ok(removed)
    }

    async fn resolve_sheet_id(&self) -> Result<SheetId, SyncError> {
        Ok(0)
    }
}
