// ABOUTME: PostgreSQL implementation of the source table
// ABOUTME: Introspects information_schema and streams rows with query_raw

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_postgres::Client;

use super::schema::{ColumnInfo, TableSchema};
use super::value::{row_to_record, select_expression, Record};
use super::SourceTable;
use crate::error::SyncError;
use crate::utils::quote_ident;

/// Reads the mirrored table from PostgreSQL.
///
/// The connection is opened lazily on first use and reopened when the
/// server has closed it, so a long-running process survives database
/// restarts between sync runs.
pub struct PostgresSource {
    url: String,
    schema: String,
    table: String,
    client: Mutex<Option<Arc<Client>>>,
}

impl PostgresSource {
    pub fn new(url: impl Into<String>, schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            schema: schema.into(),
            table: table.into(),
            client: Mutex::new(None),
        }
    }

    /// Current connection, reconnecting if the previous one was closed.
    pub async fn client(&self) -> Result<Arc<Client>> {
        let mut guard = self.client.lock().await;
        if let Some(client) = guard.as_ref() {
            if !client.is_closed() {
                return Ok(client.clone());
            }
            tracing::info!("Source connection closed, reconnecting");
        }

        let client = Arc::new(crate::postgres::connect_with_retry(&self.url).await?);
        *guard = Some(client.clone());
        Ok(client)
    }

    async fn query_columns(&self) -> Result<Vec<ColumnInfo>> {
        let client = self.client().await?;
        let rows = client
            .query(
                "SELECT column_name, data_type
                 FROM information_schema.columns
                 WHERE table_schema = $1 AND table_name = $2
                 ORDER BY ordinal_position",
                &[&self.schema, &self.table],
            )
            .await
            .with_context(|| format!("Failed to get columns for {}", self.qualified_name()))?;

        Ok(rows
            .iter()
            .map(|row| {
                let name: String = row.get(0);
                let data_type: String = row.get(1);
                ColumnInfo::new(name, data_type)
            })
            .collect())
    }

    async fn stream_rows(&self, schema: &TableSchema, order_by: Option<&str>) -> Result<Vec<Record>> {
        let client = self.client().await?;
        let query = build_select_query(&self.schema, &self.table, schema, order_by);
        tracing::debug!("Fetching rows: {}", query);

        let params: [&str; 0] = [];
        let stream = client
            .query_raw(query.as_str(), params)
            .await
            .with_context(|| format!("Failed to read rows from {}", self.qualified_name()))?;
        futures::pin_mut!(stream);

        let mut records = Vec::new();
        while let Some(row) = stream
            .try_next()
            .await
            .with_context(|| format!("Failed to read rows from {}", self.qualified_name()))?
        {
            records.push(row_to_record(&row, schema)?);
            if records.len() % 50_000 == 0 {
                tracing::debug!("Fetched {} rows from {}", records.len(), self.qualified_name());
            }
        }

        Ok(records)
    }
}

#[async_trait]
impl SourceTable for PostgresSource {
    fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }

    async fn discover_columns(&self) -> Result<TableSchema, SyncError> {
        let columns = self.query_columns().await?;
        if columns.is_empty() {
            return Err(SyncError::schema(
                self.qualified_name(),
                "table does not exist or has no columns",
            ));
        }
        Ok(TableSchema::new(columns))
    }

    async fn fetch_all(
        &self,
        schema: &TableSchema,
        order_by: Option<&str>,
    ) -> Result<Vec<Record>, SyncError> {
        Ok(self.stream_rows(schema, order_by).await?)
    }
}

/// Build the full-table SELECT.
///
/// Generates a query like:
/// ```sql
/// SELECT "id", "booking_id", "created_at" FROM "public"."bookings"
/// ORDER BY "created_at" DESC NULLS LAST
/// ```
/// Without an order column the first column, compared as text, gives a stable order.
pub fn build_select_query(
    schema_name: &str,
    table: &str,
    schema: &TableSchema,
    order_by: Option<&str>,
) -> String {
    let columns: Vec<String> = schema.columns().iter().map(select_expression).collect();

    // json and some user-defined types have no ordering operator; text always does
    let order_clause = match order_by {
        Some(column) => Some(format!("ORDER BY {} DESC NULLS LAST", quote_ident(column))),
        None => schema
            .columns()
            .first()
            .map(|first| format!("ORDER BY {}::text", quote_ident(&first.name))),
    };

    let mut query = format!(
        "SELECT {} FROM {}.{}",
        columns.join(", "),
        quote_ident(schema_name),
        quote_ident(table)
    );
    if let Some(order_clause) = order_clause {
        query.push(' ');
        query.push_str(&order_clause);
    }
    query
}
