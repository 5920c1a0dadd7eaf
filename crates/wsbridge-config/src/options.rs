//! Connection options and override resolution.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::origin::OriginPolicy;

pub const DEFAULT_LOG_LEVEL: LogLevel = LogLevel::Info;
pub const DEFAULT_WRITE_WAIT: Duration = Duration::from_secs(60);
pub const DEFAULT_PONG_WAIT: Duration = Duration::from_secs(60);
pub const DEFAULT_PING_PERIOD: Duration = Duration::from_secs(48);
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 65536;
pub const DEFAULT_SEND_CHANNEL_BUFFER: usize = 10;
pub const DEFAULT_RECV_CHANNEL_BUFFER: usize = 10;
/// Upper bound for `write_wait`, `pong_wait` and `ping_period`.
pub const MAX_WAIT: Duration = Duration::from_secs(24 * 60 * 60);

/// Verbosity of per-connection diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warning,
    Info,
    Debug,
}

impl LogLevel {
    /// Whether an event at `level` should be emitted under this verbosity.
    pub fn allows(self, level: LogLevel) -> bool {
        level <= self
    }

    /// Directive understood by `tracing_subscriber::EnvFilter`.
    pub fn as_filter(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
        }
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        DEFAULT_LOG_LEVEL
    }
}

/// A partial set of options. Unset fields, and zero durations or sizes,
/// inherit from earlier overrides or from the defaults.
#[derive(Debug, Clone, Default)]
pub struct OptionsOverride {
    pub log_level: Option<LogLevel>,
    pub write_wait: Option<Duration>,
    pub pong_wait: Option<Duration>,
    pub ping_period: Option<Duration>,
    pub max_message_size: Option<usize>,
    pub send_channel_buffer: Option<usize>,
    pub recv_channel_buffer: Option<usize>,
    pub allowed_origins: Option<OriginPolicy>,
}

impl OptionsOverride {
    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = Some(level);
        self
    }

    pub fn with_write_wait(mut self, wait: Duration) -> Self {
        self.write_wait = Some(wait);
        self
    }

    pub fn with_pong_wait(mut self, wait: Duration) -> Self {
        self.pong_wait = Some(wait);
        self
    }

    pub fn with_ping_period(mut self, period: Duration) -> Self {
        self.ping_period = Some(period);
        self
    }

    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = Some(size);
        self
    }

    pub fn with_send_channel_buffer(mut self, capacity: usize) -> Self {
        self.send_channel_buffer = Some(capacity);
        self
    }

    pub fn with_recv_channel_buffer(mut self, capacity: usize) -> Self {
        self.recv_channel_buffer = Some(capacity);
        self
    }

    pub fn with_allowed_origins(mut self, policy: OriginPolicy) -> Self {
        self.allowed_origins = Some(policy);
        self
    }

    /// Layer `other` on top of `self`, field by field.
    fn merge(self, other: &OptionsOverride) -> Self {
        Self {
            log_level: other.log_level.or(self.log_level),
            write_wait: non_zero_duration(other.write_wait).or(self.write_wait),
            pong_wait: non_zero_duration(other.pong_wait).or(self.pong_wait),
            ping_period: non_zero_duration(other.ping_period).or(self.ping_period),
            max_message_size: non_zero(other.max_message_size).or(self.max_message_size),
            send_channel_buffer: non_zero(other.send_channel_buffer).or(self.send_channel_buffer),
            recv_channel_buffer: non_zero(other.recv_channel_buffer).or(self.recv_channel_buffer),
            allowed_origins: other.allowed_origins.clone().or(self.allowed_origins),
        }
    }
}

fn non_zero_duration(value: Option<Duration>) -> Option<Duration> {
    value.filter(|d| !d.is_zero())
}

fn non_zero(value: Option<usize>) -> Option<usize> {
    value.filter(|v| *v > 0)
}

/// Resolved, immutable options for every connection on one route.
#[derive(Debug, Clone)]
pub struct Options {
    /// Verbosity of per-connection diagnostics. Never changes protocol behavior.
    pub log_level: LogLevel,
    /// Deadline for completing a single frame write.
    pub write_wait: Duration,
    /// Silence after which the peer is considered dead.
    pub pong_wait: Duration,
    /// Interval between keep-alive pings. Always shorter than `pong_wait`.
    pub ping_period: Duration,
    /// Largest inbound message, in bytes.
    pub max_message_size: usize,
    /// Capacity of the handler -> write pump channel.
    pub send_channel_buffer: usize,
    /// Capacity of the read pump -> handler channel.
    pub recv_channel_buffer: usize,
    /// Which origins may upgrade.
    pub allowed_origins: OriginPolicy,
}

impl Options {
    /// Fold `overrides` left to right over the defaults.
    ///
    /// When only one of `ping_period` / `pong_wait` is given the other is
    /// derived from it (ping at 80% of the pong window), so a lone override
    /// never breaks `ping_period < pong_wait`.
    pub fn resolve<'a, I>(overrides: I) -> Self
    where
        I: IntoIterator<Item = &'a OptionsOverride>,
    {
        let merged = overrides
            .into_iter()
            .fold(OptionsOverride::default(), |acc, o| acc.merge(o));

        let (ping_period, pong_wait) = match (merged.ping_period, merged.pong_wait) {
            (Some(ping), Some(pong)) => (ping, pong),
            (Some(ping), None) => (ping, ping.checked_add(ping / 4).unwrap_or(Duration::MAX)),
            (None, Some(pong)) => (pong / 10 * 8, pong),
            (None, None) => (DEFAULT_PING_PERIOD, DEFAULT_PONG_WAIT),
        };

        Self {
            log_level: merged.log_level.unwrap_or(DEFAULT_LOG_LEVEL),
            write_wait: merged.write_wait.unwrap_or(DEFAULT_WRITE_WAIT),
            pong_wait,
            ping_period,
            max_message_size: merged.max_message_size.unwrap_or(DEFAULT_MAX_MESSAGE_SIZE),
            send_channel_buffer: merged
                .send_channel_buffer
                .unwrap_or(DEFAULT_SEND_CHANNEL_BUFFER),
            recv_channel_buffer: merged
                .recv_channel_buffer
                .unwrap_or(DEFAULT_RECV_CHANNEL_BUFFER),
            allowed_origins: merged.allowed_origins.unwrap_or_default(),
        }
    }

    /// Check invariants that overrides can still violate.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("write_wait", self.write_wait),
            ("pong_wait", self.pong_wait),
            ("ping_period", self.ping_period),
        ] {
            if value > MAX_WAIT {
                return Err(ConfigError::invalid_value(
                    field,
                    format!("must not exceed {:?} (got {:?})", MAX_WAIT, value),
                ));
            }
        }
        if self.ping_period >= self.pong_wait {
            return Err(ConfigError::invalid_value(
                "ping_period",
                format!(
                    "must be shorter than pong_wait ({:?} >= {:?})",
                    self.ping_period, self.pong_wait
                ),
            ));
        }
        if self.write_wait.is_zero() {
            return Err(ConfigError::invalid_value("write_wait", "must be greater than 0"));
        }
        if self.max_message_size == 0 {
            return Err(ConfigError::invalid_value(
                "max_message_size",
                "must be greater than 0",
            ));
        }
        if self.send_channel_buffer == 0 || self.recv_channel_buffer == 0 {
            return Err(ConfigError::invalid_value(
                "channel_buffer",
                "channel capacities must be greater than 0",
            ));
        }
        self.allowed_origins.validate()
    }
}

impl Default for Options {
    fn default() -> Self {
        Self::resolve(&[])
    }
}

#[cfg(test)]
#[path = "options_tests.rs"]
mod tests;
