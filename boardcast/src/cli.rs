//! Command-line interface for the `boardcast` binary.

use clap::{Args, Parser, Subcommand};

use boardcast_proto::square::Square;

use crate::client::DEFAULT_RELAY_URL;

#[derive(Parser, Debug)]
#[command(author, version, about = "Send and watch moves on a Boardcast relay", long_about = None)]
pub struct Cli {
    /// Relay WebSocket URL.
    #[arg(long, global = true, default_value = DEFAULT_RELAY_URL, env = "BOARDCAST_URL")]
    pub url: String,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "warn", env = "BOARDCAST_LOG")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print every move other boards make until interrupted.
    Watch,
    /// Publish a single move and exit.
    Move(MoveArgs),
}

#[derive(Args, Debug, Clone)]
pub struct MoveArgs {
    /// Origin square in algebraic notation, e.g. `e2`.
    pub from: Square,

    /// Destination square in algebraic notation, e.g. `e4`.
    pub to: Square,
}
