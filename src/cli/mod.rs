//! CLI definitions for the gateway binary.
//!
//! # Commands
//!
//! - `serve` - Start the gateway server
//! - `config init` - Write an example configuration file
//!
//! # Example
//!
//! ```bash
//! gateway serve --config gateway.toml
//! gateway config init
//! ```

pub mod config;
pub mod serve;

pub use config::handle_config_init;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Local LLM gateway: an OpenAI-compatible front door over co-located
/// inference backends.
#[derive(Parser, Debug)]
#[command(
    name = "gateway",
    version,
    about = "Local LLM gateway with VRAM-aware model switching"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the gateway server
    Serve(ServeArgs),
    /// Configuration utilities
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "gateway.toml")]
    pub config: PathBuf,

    /// Override server port
    #[arg(short, long, env = "GATEWAY_PORT")]
    pub port: Option<u16>,

    /// Override server host
    #[arg(short = 'H', long, env = "GATEWAY_HOST")]
    pub host: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "GATEWAY_LOG_LEVEL")]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Initialize a new configuration file
    Init(ConfigInitArgs),
}

#[derive(Args, Debug)]
pub struct ConfigInitArgs {
    /// Output file path
    #[arg(short, long, default_value = "gateway.toml")]
    pub output: PathBuf,

    /// Overwrite existing file
    #[arg(short, long)]
    pub force: bool,
}
