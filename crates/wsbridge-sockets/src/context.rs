//! Per-connection request context handed to handlers.

use axum::http::{header, HeaderMap, Method, Uri};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// What the handler knows about the request that opened its connection.
#[derive(Debug, Clone)]
pub struct SocketContext {
    /// Unique connection ID.
    pub id: Uuid,
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    /// When the upgrade was accepted.
    pub connected_at: DateTime<Utc>,
}

impl SocketContext {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap) -> Self {
        Self {
            id: Uuid::new_v4(),
            method,
            uri,
            headers,
            connected_at: Utc::now(),
        }
    }

    /// Header value as a string, if present and valid.
    pub fn header(&self, name: impl header::AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn origin(&self) -> Option<&str> {
        self.header(header::ORIGIN)
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }
}
