//! Server initialization and startup logic for wsbridge.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use wsbridge_config::{Config, ConfigLoader, Options};

use crate::routes;

/// Get the .wsbridge directory path.
pub(crate) fn wsbridge_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".wsbridge"))
        .unwrap_or_else(|| PathBuf::from(".wsbridge"))
}

/// Initialize tracing with console and file output.
///
/// Log files are written to ~/.wsbridge/logs/ with daily rotation. `default`
/// is the filter used when `RUST_LOG` is unset.
pub(crate) fn init_tracing(default: &str) -> Result<(), Box<dyn std::error::Error>> {
    let log_dir = wsbridge_dir().join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("wsbridge")
        .filename_suffix("log")
        .max_log_files(30)
        .build(&log_dir)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Flushes the file writer on exit.
    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
        std::sync::OnceLock::new();
    let _ = GUARD.set(guard);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_ansi(true))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(())
}

/// Load `path`, or fall back to the defaults when it does not exist.
pub(crate) fn load_config(path: &Path) -> Result<Config, Box<dyn std::error::Error>> {
    if path.exists() {
        Ok(ConfigLoader::load(path)?)
    } else {
        Ok(Config::default())
    }
}

/// Print the socket options every route will use.
pub(crate) fn print_options(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let options = Options::resolve(&[config.sockets.to_override()]);
    options.validate()?;

    println!("server.host           = {}", config.server.host);
    println!("server.port           = {}", config.server.port);
    println!("log_level             = {:?}", options.log_level);
    println!("write_wait            = {:?}", options.write_wait);
    println!("pong_wait             = {:?}", options.pong_wait);
    println!("ping_period           = {:?}", options.ping_period);
    println!("max_message_size      = {}", options.max_message_size);
    println!("send_channel_buffer   = {}", options.send_channel_buffer);
    println!("recv_channel_buffer   = {}", options.recv_channel_buffer);
    println!("allowed_origins       = {:?}", options.allowed_origins);
    Ok(())
}

/// Run the demo server until Ctrl-C.
pub(crate) async fn run_server(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting wsbridge v{}", env!("CARGO_PKG_VERSION"));

    let app = routes::router(&config.sockets.to_override())?;

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = TcpListener::bind(addr).await?;

    info!("wsbridge ready at ws://{}", addr);
    info!("Socket routes:");
    info!("  /echo              - JSON echo");
    info!("  /receiver          - JSON receiver");
    info!("  /sender            - JSON sender");
    info!("  /strings/receiver  - string receiver");
    info!("  /strings/sender    - string sender");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl-C: {}", e);
            }
        })
        .await?;

    info!("Shutting down...");
    Ok(())
}
