//! The connection's broadcast-once termination signal.

use std::sync::{Arc, OnceLock};

use tokio_util::sync::CancellationToken;

use crate::error::SocketError;

/// Why a connection began closing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The handler returned.
    HandlerReturned,
    /// The handler asked to close with this code.
    Disconnect(u16),
    /// The peer sent a close frame (with its code) or the stream ended.
    PeerClosed(Option<u16>),
    /// A pump or the handler failed.
    Failed(SocketError),
}

/// Fires once when the connection starts tearing down.
///
/// Every participant (handler, read pump, write pump) holds a clone. The
/// first [`CloseReason`] recorded wins; later signals still leave the token
/// cancelled but do not overwrite it.
#[derive(Debug, Clone, Default)]
pub struct Done {
    inner: Arc<DoneInner>,
}

#[derive(Debug, Default)]
struct DoneInner {
    token: CancellationToken,
    reason: OnceLock<CloseReason>,
}

impl Done {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Record `reason` and fire. Returns `true` only for the first caller.
    pub(crate) fn signal(&self, reason: CloseReason) -> bool {
        let first = self.inner.reason.set(reason).is_ok();
        self.inner.token.cancel();
        first
    }

    /// Wait until the connection starts closing. Returns immediately if it
    /// already has.
    pub async fn cancelled(&self) {
        self.inner.token.cancelled().await
    }

    pub fn is_done(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// The reason recorded by whoever fired first.
    pub fn reason(&self) -> Option<CloseReason> {
        self.inner.reason.get().cloned()
    }
}
