// ABOUTME: CLI entry point for sheet-replicator
// ABOUTME: Parses commands and routes to the sync, watch and check handlers

use clap::{Parser, Subcommand};
use sheet_replicator::commands;
use sheet_replicator::config::SyncConfig;

#[derive(Parser)]
#[command(name = "sheet-replicator")]
#[command(about = "Mirror a PostgreSQL table into a Google Sheet", long_about = None)]
#[command(version)]
struct Cli {
    /// Allow self-signed TLS certificates (insecure - use only for testing)
    #[arg(
        long = "allow-self-signed-certs",
        global = true,
        default_value_t = false
    )]
    allow_self_signed_certs: bool,
    /// Set the log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    log: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one sync and print the result as JSON
    Sync {
        #[command(flatten)]
        config: SyncConfig,
    },
    /// Sync on a fixed interval until interrupted
    ///
    /// Ticks that fire while a sync is running are folded into a single
    /// follow-up run.
    Watch {
        #[command(flatten)]
        config: SyncConfig,
        /// Seconds between sync requests
        #[arg(long, env = "SYNC_INTERVAL_SECS", default_value_t = 300)]
        interval: u64,
    },
    /// Check source access, key column and sheet header without writing
    Check {
        #[command(flatten)]
        config: SyncConfig,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --log
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cli.log.clone()));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    sheet_replicator::postgres::init_tls_policy(cli.allow_self_signed_certs);

    match cli.command {
        Commands::Sync { config } => commands::sync(&config).await,
        Commands::Watch { config, interval } => commands::watch(&config, interval).await,
        Commands::Check { config } => commands::check(&config).await,
    }
}
