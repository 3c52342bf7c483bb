//! CLI command definitions using clap

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// yapscope - Keep a fresh local snapshot of yap point scores
#[derive(Debug, Parser)]
#[command(name = "yapscope")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Ethereum RPC URL for ENS lookups (overrides config)
    #[arg(short = 'u', long, global = true)]
    pub rpc_url: Option<String>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show the current score snapshot, refreshing it if stale
    Scores {
        /// Ignore the cache and fetch from the network
        #[arg(short, long)]
        force: bool,
    },

    /// Look up one user's yap points
    Lookup {
        /// Username, with or without a leading @
        username: String,
    },

    /// Show cache age and freshness
    Status,

    /// Resolve and download the published snapshot without touching the cache
    Verify {
        /// Number of gateway sweeps before giving up
        #[arg(short, long, default_value_t = 3)]
        attempts: u32,
    },

    /// Answer line-delimited JSON requests on stdin and refresh on a schedule
    Serve,

    /// Validate an attestation export and check whether the name record needs updating
    PublishCheck {
        /// Path to the export file
        #[arg(default_value = "attestations.json")]
        file: PathBuf,

        /// Content id the export was uploaded as
        #[arg(long)]
        cid: String,
    },

    /// Manage the local snapshot cache
    Cache {
        #[command(subcommand)]
        action: CacheCommands,
    },

    /// Manage yapscope configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub enum CacheCommands {
    /// Delete the cached snapshot
    Clear,
}

#[derive(Debug, Clone, Subcommand)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Set configuration values
    Set {
        /// Ethereum RPC URL
        #[arg(long)]
        rpc_url: Option<String>,

        /// Replace the gateway list (repeat in priority order)
        #[arg(long = "gateway")]
        gateways: Vec<String>,

        /// ENS name holding the content id
        #[arg(long)]
        ens_name: Option<String>,

        /// Text record key holding the content id
        #[arg(long)]
        record_key: Option<String>,
    },
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
