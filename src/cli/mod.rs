//! Command-line interface
//!
//! # Commands
//!
//! - `serve` - Run the distribution service
//! - `queues` - Show the queues and members a config file provisions
//! - `config init` - Write an example configuration file
//!
//! # Example
//!
//! ```bash
//! distributor config init -o distributor.toml
//! distributor queues --tenant acme
//! distributor serve -p 9000
//! ```

pub mod config;
pub mod queues;
pub mod serve;

pub use config::handle_config_init;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Contact-center queue distributor
#[derive(Parser, Debug)]
#[command(
    name = "distributor",
    version,
    about = "Queue distribution core: agent selection, realtime queue metrics and failover"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the distributor server
    Serve(ServeArgs),
    /// List configured queues and their members
    Queues(QueuesArgs),
    /// Configuration utilities
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "distributor.toml")]
    pub config: PathBuf,

    /// Override server port
    #[arg(short, long, env = "DISTRIBUTOR_PORT")]
    pub port: Option<u16>,

    /// Override server host
    #[arg(short = 'H', long, env = "DISTRIBUTOR_HOST")]
    pub host: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "DISTRIBUTOR_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Do not run the background failover checker
    #[arg(long)]
    pub no_failover_scheduler: bool,
}

#[derive(Args, Debug)]
pub struct QueuesArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Only show queues of this tenant
    #[arg(short, long)]
    pub tenant: Option<String>,

    /// Path to configuration file
    #[arg(short, long, default_value = "distributor.toml")]
    pub config: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Initialize a new configuration file
    Init(ConfigInitArgs),
}

#[derive(Args, Debug)]
pub struct ConfigInitArgs {
    /// Output file path
    #[arg(short, long, default_value = "distributor.toml")]
    pub output: PathBuf,

    /// Overwrite existing file
    #[arg(short, long)]
    pub force: bool,
}
