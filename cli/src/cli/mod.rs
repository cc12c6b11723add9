pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "relaychat-proxy")]
#[command(author, version, about = "Chat relay CLI - forward messages to a nonce-protected upstream")]
pub struct Cli {
    /// Path to config file (checked in order: local config.toml, ~/.config/relaychat-proxy/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the proxy server
    Start {
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Fetch a nonce once and report whether the origin is reachable
    Check,
}
