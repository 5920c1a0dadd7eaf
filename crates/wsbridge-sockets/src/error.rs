//! Socket errors.

use std::time::Duration;

use axum::extract::ws::close_code;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Everything that can end an upgrade attempt or a live connection.
///
/// Only the first three variants are ever turned into an HTTP response; the
/// rest happen after `101 Switching Protocols` and surface through the
/// connection's close reason instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SocketError {
    #[error("Origin not allowed: {0}")]
    OriginRejected(String),

    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    #[error("Upgrade failed: {0}")]
    UpgradeFailed(String),

    #[error("Decode failed: {0}")]
    Decode(String),

    #[error("Encode failed: {0}")]
    Encode(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Message too large: {size} bytes, max {max} bytes")]
    MessageTooLarge { size: usize, max: usize },

    #[error("Read deadline exceeded after {0:?}")]
    ReadTimeout(Duration),

    #[error("Write deadline exceeded after {0:?}")]
    WriteTimeout(Duration),

    #[error("Handler panicked: {0}")]
    HandlerPanic(String),

    #[error("Connection closed")]
    Closed,
}

impl SocketError {
    /// Transport-level failures: I/O, deadlines and size violations.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Transport(_)
                | Self::MessageTooLarge { .. }
                | Self::ReadTimeout(_)
                | Self::WriteTimeout(_)
        )
    }

    /// HTTP status for errors raised before the upgrade completes.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::OriginRejected(_) => StatusCode::FORBIDDEN,
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::UpgradeFailed(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Close code written to the peer when this error ends a connection.
    pub fn close_code(&self) -> u16 {
        match self {
            Self::Decode(_) => close_code::INVALID,
            Self::MessageTooLarge { .. } => close_code::SIZE,
            Self::HandlerPanic(_) | Self::Encode(_) => close_code::ERROR,
            _ => close_code::AWAY,
        }
    }
}

impl IntoResponse for SocketError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            Self::MethodNotAllowed(_) => (
                status,
                [(header::ALLOW, "GET")],
                self.to_string(),
            )
                .into_response(),
            _ => (status, self.to_string()).into_response(),
        }
    }
}
