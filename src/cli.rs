//! CLI definitions for wsbridge.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// wsbridge CLI.
#[derive(Parser)]
#[command(name = "wsbridge")]
#[command(about = "Websocket connection bridge demo server")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml", global = true)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Run the demo server in foreground (default)
    Run {
        /// Server host (overrides the config file)
        #[arg(long, env = "WSBRIDGE_HOST")]
        host: Option<String>,

        /// Server port (overrides the config file)
        #[arg(long, env = "WSBRIDGE_PORT")]
        port: Option<u16>,
    },

    /// Print the resolved socket options and exit
    Config,
}
