//! Command-line interface for tictactoe_rooms.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Tic-tac-toe rooms - play a friend through a shared realtime database
#[derive(Parser, Debug)]
#[command(name = "tictactoe_rooms")]
#[command(about = "Two-player tic-tac-toe over a shared room store", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to the TOML config file
    #[arg(long, global = true, default_value = "tictactoe.toml")]
    pub config: PathBuf,

    /// Participant id (random if not given)
    #[arg(long, global = true)]
    pub player_id: Option<String>,

    /// Display name
    #[arg(long, global = true, default_value = "Player")]
    pub name: String,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Open a new room and wait for an opponent
    Host {
        /// List the room publicly
        #[arg(long)]
        public: bool,
    },

    /// Join a room by its code
    Join {
        /// Four-character room code (case-insensitive)
        code: String,
    },

    /// Show public rooms
    List {
        /// Only rooms whose code or host name contains this text
        #[arg(long)]
        filter: Option<String>,
    },

    /// Print a room's state on every poll without joining
    Watch {
        /// Four-character room code (case-insensitive)
        code: String,
    },
}
