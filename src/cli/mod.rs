//! Command-line interface.

pub mod commands;
pub mod types;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::domain::errors::AdapterError;

pub use types::{Cli, Commands};

/// Run the selected adapter until `shutdown` is cancelled or it fails.
pub async fn run(cli: Cli, shutdown: CancellationToken) -> Result<()> {
    match cli.command {
        Commands::Webhook(args) => commands::webhook::execute(args, shutdown).await,
        Commands::Poller(args) => commands::poller::execute(args, shutdown).await,
        Commands::Stream(args) => commands::stream::execute(args, shutdown).await,
    }
}

/// Log a terminal error and exit with a non-zero status.
pub fn handle_error(err: &anyhow::Error) -> ! {
    let adapter_error = err.downcast_ref::<AdapterError>();
    let kind = match adapter_error {
        Some(AdapterError::Configuration(_)) => "configuration",
        Some(AdapterError::SessionStart(_)) => "session",
        Some(AdapterError::Subscription(_)) => "subscription",
        Some(AdapterError::ShutdownTimeout(_)) => "shutdown",
        Some(_) => "adapter",
        None => "startup",
    };
    let fatal = adapter_error.map_or(true, AdapterError::is_fatal);
    error!(kind, fatal, error = %format!("{err:#}"), "adapter terminated");
    eprintln!("Error: {err:#}");
    std::process::exit(1);
}
