// ABOUTME: Error taxonomy for sheet synchronization runs
// ABOUTME: Every failure is caught at the run boundary and folded into SyncResult

use thiserror::Error;

/// Errors raised while synchronizing the source table with the remote sheet.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The source table is missing or has no columns.
    #[error("schema error for {table}: {reason}")]
    Schema { table: String, reason: String },

    /// Database I/O failed while introspecting or fetching rows.
    #[error("source database error: {0:#}")]
    Source(#[from] anyhow::Error),

    /// The remote sheet API rejected a request or could not be reached.
    #[error("remote sheet error during {operation}{}: {message}", http_suffix(.status))]
    RemoteSink {
        operation: &'static str,
        status: Option<u16>,
        message: String,
    },

    /// Pruning stale remote rows failed after new rows were appended.
    #[error("failed to prune {rows} stale remote rows: {message}")]
    PartialPrune { rows: usize, message: String },

    /// Configuration is incomplete or invalid.
    #[error("invalid configuration: {0}")]
    Config(String),
}

fn http_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default()
}

impl SyncError {
    pub fn schema(table: impl Into<String>, reason: impl Into<String>) -> Self {
        SyncError::Schema {
            table: table.into(),
            reason: reason.into(),
        }
    }

    /// Remote failure without an HTTP status (transport, decoding, auth exchange).
    pub fn remote(operation: &'static str, message: impl Into<String>) -> Self {
        SyncError::RemoteSink {
            operation,
            status: None,
            message: message.into(),
        }
    }

    /// Remote failure carrying the HTTP status the API answered with.
    pub fn remote_status(operation: &'static str, status: u16, message: impl Into<String>) -> Self {
        SyncError::RemoteSink {
            operation,
            status: Some(status),
            message: message.into(),
        }
    }
}
