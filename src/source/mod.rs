// ABOUTME: Source table access for the sync engine
// ABOUTME: Schema introspection and record fetching behind the SourceTable trait

pub mod memory;
pub mod postgres;
pub mod schema;
pub mod value;

pub use memory::MemoryTable;
pub use postgres::PostgresSource;
pub use schema::{ColumnInfo, ScalarKind, TableSchema};
pub use value::{CellValue, Record};

use async_trait::async_trait;

use crate::error::SyncError;

/// Read-only access to the table being mirrored.
#[async_trait]
pub trait SourceTable: Send + Sync {
    /// Qualified name used in logs and errors (`schema.table`).
    fn qualified_name(&self) -> String;

    /// Discover the table's columns in ordinal order.
    ///
    /// Fails with [`SyncError::Schema`] when the table does not exist or has
    /// no columns.
    async fn discover_columns(&self) -> Result<TableSchema, SyncError>;

    /// Fetch every row, most recent first when `order_by` names a column.
    async fn fetch_all(
        &self,
        schema: &TableSchema,
        order_by: Option<&str>,
    ) -> Result<Vec<Record>, SyncError>;
}
