//! Configuration file schema.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::options::{LogLevel, OptionsOverride};
use crate::origin::OriginPolicy;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub sockets: SocketsConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

/// Socket options as written in the `[sockets]` table.
///
/// Every field is optional; missing ones fall back to the built-in defaults
/// when converted with [`SocketsConfig::to_override`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SocketsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<LogLevel>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_wait_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pong_wait_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ping_period_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_message_size: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send_channel_buffer: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recv_channel_buffer: Option<usize>,

    /// Exact origins allowed to connect.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_origins: Option<Vec<String>>,

    /// Origin regex; `{{host}}` expands to the request host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_origin_pattern: Option<String>,

    /// Disable the origin check entirely.
    #[serde(default)]
    pub allow_any_origin: bool,
}

impl SocketsConfig {
    /// Convert into an override layer. `allow_any_origin` wins over an origin
    /// list, which wins over a pattern.
    pub fn to_override(&self) -> OptionsOverride {
        let allowed_origins = if self.allow_any_origin {
            Some(OriginPolicy::Any)
        } else if let Some(list) = &self.allowed_origins {
            Some(OriginPolicy::List(list.clone()))
        } else {
            self.allowed_origin_pattern
                .as_ref()
                .map(|p| OriginPolicy::pattern(p.clone()))
        };

        OptionsOverride {
            log_level: self.log_level,
            write_wait: self.write_wait_ms.map(Duration::from_millis),
            pong_wait: self.pong_wait_ms.map(Duration::from_millis),
            ping_period: self.ping_period_ms.map(Duration::from_millis),
            max_message_size: self.max_message_size,
            send_channel_buffer: self.send_channel_buffer,
            recv_channel_buffer: self.recv_channel_buffer,
            allowed_origins,
        }
    }
}
