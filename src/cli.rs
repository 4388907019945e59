//! Command-line interface for chess_sessions.

use clap::{Parser, Subcommand};

/// Chess Sessions - concurrent chess games with a built-in engine
#[derive(Parser, Debug)]
#[command(name = "chess_sessions")]
#[command(about = "Chess session manager with an alpha-beta engine", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to bot configuration (defaults are used if missing)
    #[arg(short, long, global = true, default_value = "chess_bot.toml")]
    pub config: std::path::PathBuf,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Drive sessions in one local channel from stdin
    Console {
        /// Channel id used for every session
        #[arg(long, default_value = "1")]
        channel: u64,
    },

    /// Replay moves and print suggestions plus a position explanation
    Analyze {
        /// Moves in long or short notation
        moves: Vec<String>,

        /// Starting position (standard start if omitted)
        #[arg(long)]
        fen: Option<String>,

        /// Number of suggestions to print
        #[arg(short = 'n', long, default_value = "3")]
        count: usize,
    },
}
