//! Command-line interface for strictly_tournament.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use strictly_tournament::{PlayerId, StrategyKind};

/// Strictly Tournament - elimination-bracket tournament client
#[derive(Parser, Debug)]
#[command(name = "strictly_tournament")]
#[command(about = "Plays trivia and Rock-Paper-Scissors tournaments", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Tournament server URL (overrides config and environment)
    #[arg(long, global = true)]
    pub server_url: Option<String>,

    /// Poll interval in milliseconds (overrides config and environment)
    #[arg(long, global = true)]
    pub poll_interval_ms: Option<u64>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the rebuilt session for a player without submitting anything
    Status {
        /// Player id issued at registration
        #[arg(long)]
        player_id: PlayerId,
    },

    /// Register and play, answering and choosing moves on stdin
    Play {
        /// Player name to register
        #[arg(short, long)]
        name: String,
    },

    /// Register and play automatically
    Auto {
        /// Player name to register
        #[arg(short, long)]
        name: String,

        /// Move strategy
        #[arg(long, value_enum, default_value_t = StrategyKind::Random)]
        strategy: StrategyKind,

        /// Answer questions with the configured LLM
        #[arg(long)]
        llm: bool,
    },

    /// Resume an existing player automatically
    Reconnect {
        /// Player id issued at registration
        #[arg(long)]
        player_id: PlayerId,

        /// Move strategy
        #[arg(long, value_enum, default_value_t = StrategyKind::Random)]
        strategy: StrategyKind,

        /// Answer questions with the configured LLM
        #[arg(long)]
        llm: bool,
    },

    /// Run the HTTP session front end
    Serve {
        /// Port to bind to
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },
}
