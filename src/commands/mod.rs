// ABOUTME: Command implementations for the CLI
// ABOUTME: Exports sync, watch and check commands

pub mod check;
pub mod sync;
pub mod watch;

pub use check::check;
pub use sync::sync;
pub use watch::watch;
