// ABOUTME: In-process source table holding rows in memory
// ABOUTME: Lets the sync pipeline run without a database (tests, local dry runs)

use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::schema::TableSchema;
use super::value::{CellValue, Record};
use super::SourceTable;
use crate::error::SyncError;

/// A mutable table whose schema and rows can be changed between runs.
pub struct MemoryTable {
    name: String,
    state: Mutex<TableState>,
}

#[derive(Default)]
struct TableState {
    schema: TableSchema,
    rows: Vec<Record>,
}

impl MemoryTable {
    pub fn new(name: impl Into<String>, schema: TableSchema) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(TableState {
                schema,
                rows: Vec::new(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, TableState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert(&self, values: Vec<CellValue>) {
        self.state().rows.push(Record::new(values));
    }

    /// Remove every row whose cell at `column` has the given key text.
    pub fn delete_where(&self, column: &str, key: &str) -> usize {
        let mut state = self.state();
        let Some(idx) = state.schema.position(column) else {
            return 0;
        };
        let before = state.rows.len();
        state
            .rows
            .retain(|row| row.key(idx).as_deref() != Some(key));
        before - state.rows.len()
    }

    /// Replace the schema; rows are reset because their shape no longer matches.
    pub fn alter(&self, schema: TableSchema, rows: Vec<Vec<CellValue>>) {
        let mut state = self.state();
        state.schema = schema;
        state.rows = rows.into_iter().map(Record::new).collect();
    }

    pub fn len(&self) -> usize {
        self.state().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().rows.is_empty()
    }
}

#[async_trait]
impl SourceTable for MemoryTable {
    fn qualified_name(&self) -> String {
        self.name.clone()
    }

    async fn discover_columns(&self) -> Result<TableSchema, SyncError> {
        let schema = self.state().schema.clone();
        if schema.is_empty() {
            return Err(SyncError::schema(
                self.qualified_name(),
                "table does not exist or has no columns",
            ));
        }
        Ok(schema)
    }

    async fn fetch_all(
        &self,
        schema: &TableSchema,
        order_by: Option<&str>,
    ) -> Result<Vec<Record>, SyncError> {
        let mut rows = self.state().rows.clone();

        if let Some(idx) = order_by.and_then(|column| schema.position(column)) {
            // Newest first; nulls last
            rows.sort_by(|a, b| match (a.get(idx), b.get(idx)) {
                (Some(CellValue::Timestamp(x)), Some(CellValue::Timestamp(y))) => y.cmp(x),
                (Some(CellValue::Timestamp(_)), _) => std::cmp::Ordering::Less,
                (_, Some(CellValue::Timestamp(_))) => std::cmp::Ordering::Greater,
                _ => std::cmp::Ordering::Equal,
            });
        }

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ColumnInfo;
    use chrono::{TimeZone, Utc};

    fn table() -> MemoryTable {
        MemoryTable::new(
            "public.bookings",
            TableSchema::new(vec![
                ColumnInfo::new("booking_id", "text"),
                ColumnInfo::new("created_at", "timestamp with time zone"),
            ]),
        )
    }

    #[tokio::test]
    async fn test_fetch_orders_newest_first() {
        let table = table();
        let older = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let newer = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        table.insert(vec![CellValue::Text("A".into()), CellValue::Timestamp(older)]);
        table.insert(vec![CellValue::Text("B".into()), CellValue::Null]);
        table.insert(vec![CellValue::Text("C".into()), CellValue::Timestamp(newer)]);

        let schema = table.discover_columns().await.unwrap();
        let rows = table.fetch_all(&schema, Some("created_at")).await.unwrap();
        let keys: Vec<_> = rows.iter().map(|r| r.key(0).unwrap()).collect();

        assert_eq!(keys, vec!["C", "A", "B"]);
    }

    #[tokio::test]
    async fn test_empty_schema_is_schema_error() {
        let table = MemoryTable::new("public.missing", TableSchema::default());
        let err = table.discover_columns().await.unwrap_err();
        assert!(matches!(err, SyncError::Schema { .. }));
    }

    #[test]
    fn test_delete_where() {
        let table = table();
        table.insert(vec![CellValue::Text("A".into()), CellValue::Null]);
        table.insert(vec![CellValue::Text("B".into()), CellValue::Null]);

        assert_eq!(table.delete_where("booking_id", "A"), 1);
        assert_eq!(table.delete_where("booking_id", "Z"), 0);
        assert_eq!(table.delete_where("nope", "B"), 0);
        assert_eq!(table.len(), 1);
    }
}
