// ABOUTME: Library root for sheet-replicator
// ABOUTME: Mirrors a PostgreSQL table into a Google Sheet with single-flight sync runs

pub mod commands;
pub mod config;
pub mod error;
pub mod postgres;
pub mod preflight;
pub mod scheduler;
pub mod sheets;
pub mod source;
pub mod sync;
pub mod utils;

pub use config::SyncConfig;
pub use error::SyncError;
pub use sync::{SyncCoordinator, SyncEngine, SyncResult};
