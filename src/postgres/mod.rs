// ABOUTME: PostgreSQL connectivity for the source database
// ABOUTME: Connection setup, TLS policy and permission checks

pub mod connection;
pub mod privileges;

pub use connection::{connect, connect_with_retry, init_tls_policy};
pub use privileges::{check_table_select_permission, TablePermissionCheck};
