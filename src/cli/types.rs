//! CLI type definitions
//!
//! Clap structures for the three adapter subcommands. Every argument is
//! backed by the environment variable the control plane sets.

use clap::{Parser, Subcommand};

use super::commands::{PollerArgs, StreamArgs, WebhookArgs};
use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::logging::{LogConfig, LogFormat};

#[derive(Parser, Debug)]
#[command(name = "cloudevent-sources")]
#[command(about = "Event source adapters that emit CloudEvents to a sink", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info", global = true, value_parser = ConfigLoader::log_level)]
    pub log_level: String,

    /// Log output format (json, pretty)
    #[arg(long, env = "LOG_FORMAT", default_value = "json", global = true)]
    pub log_format: LogFormat,
}

impl Cli {
    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            level: self.log_level.clone(),
            format: self.log_format,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Receive JSON payloads over HTTP and forward them as CloudEvents
    Webhook(WebhookArgs),

    /// Poll an HTTP endpoint on a fixed interval
    Poller(PollerArgs),

    /// Stream messages from a Bayeux/CometD server
    Stream(StreamArgs),
}
