//! CLI argument definitions using clap

use crate::config::ConfigArgs;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "hookrelay",
    about = "HookRelay - workflow robot that relays HTTP requests and calls back with the result",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub config: ConfigArgs,

    /// Enable verbose logging
    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, env = "HOOKRELAY_JSON_LOGS", global = true)]
    pub json_logs: bool,

    /// Disable colored output
    #[arg(long, global = true, help = "Disable colored output")]
    pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the relay HTTP server
    Serve {
        #[command(flatten)]
        args: crate::commands::ServeArgs,
    },

    /// Report whether a valid access token is available for a portal,
    /// refreshing it when due
    CheckToken {
        /// Portal member id
        #[arg(long)]
        member_id: String,
    },
}
