//! wsbridge - websocket connection bridge
//!
//! Demo server exposing the sample socket routes.

mod cli;
mod routes;
mod server;

use clap::Parser;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mut config = server::load_config(&cli.config)?;

    match cli.command {
        Some(Commands::Config) => server::print_options(&config),
        Some(Commands::Run { host, port }) => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            start(config).await
        }
        None => start(config).await,
    }
}

async fn start(config: wsbridge_config::Config) -> Result<(), Box<dyn std::error::Error>> {
    let level = config.sockets.log_level.unwrap_or(wsbridge_config::DEFAULT_LOG_LEVEL);
    server::init_tracing(level.as_filter())?;
    server::run_server(config).await
}
