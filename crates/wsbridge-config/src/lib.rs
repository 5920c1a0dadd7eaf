//! # wsbridge Config
//!
//! Per-route connection options for wsbridge sockets, plus the TOML
//! configuration file used by the `wsbridge` binary.
//!
//! Options are resolved by folding zero or more [`OptionsOverride`] values
//! over the built-in defaults:
//!
//! ```
//! use std::time::Duration;
//! use wsbridge_config::{LogLevel, Options, OptionsOverride};
//!
//! let options = Options::resolve(&[OptionsOverride::default()
//!     .with_log_level(LogLevel::Debug)
//!     .with_ping_period(Duration::from_secs(10))]);
//!
//! assert_eq!(options.ping_period, Duration::from_secs(10));
//! assert!(options.ping_period < options.pong_wait);
//! ```

mod error;
mod loader;
mod options;
mod origin;
mod schema;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use options::{
    LogLevel, Options, OptionsOverride, DEFAULT_LOG_LEVEL, DEFAULT_MAX_MESSAGE_SIZE,
    DEFAULT_PING_PERIOD, DEFAULT_PONG_WAIT, DEFAULT_RECV_CHANNEL_BUFFER,
    DEFAULT_SEND_CHANNEL_BUFFER, DEFAULT_WRITE_WAIT, MAX_WAIT,
};
pub use origin::{OriginPattern, OriginPolicy, DEFAULT_ORIGIN_PATTERN};
pub use schema::{Config, ServerConfig, SocketsConfig};
