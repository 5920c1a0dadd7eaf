//! One upgraded connection: the pump pair, the handler, and teardown.

use std::fmt::Display;
use std::sync::Arc;

use axum::extract::ws::Message;
use axum::http::StatusCode;
use futures::{Sink, Stream};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use wsbridge_config::{LogLevel, Options};

use crate::codec::Codec;
use crate::context::SocketContext;
use crate::done::{CloseReason, Done};
use crate::handler::{run_handler, Bindings, Disconnect, Invoker};
use crate::pump::{read_pump, write_pump};

/// Lifecycle of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Upgrading,
    Active,
    Closing,
    Closed,
}

/// Outcome of a finished connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionReport {
    pub id: Uuid,
    /// Status returned by the handler, or 500 if it panicked.
    pub status: StatusCode,
    /// The first close reason recorded.
    pub reason: Option<CloseReason>,
    /// Close code the server wrote, if it wrote one.
    pub close_code: Option<u16>,
}

impl ConnectionReport {
    /// Whether the handler returned a 2xx status.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Owns everything one connection needs between upgrade and release.
pub struct Connection<C: Codec> {
    context: SocketContext,
    codec: Arc<C>,
    options: Arc<Options>,
    state: Arc<Mutex<ConnectionState>>,
    done: Done,
}

impl<C: Codec> Connection<C> {
    pub fn new(context: SocketContext, codec: Arc<C>, options: Arc<Options>) -> Self {
        Self {
            context,
            codec,
            options,
            state: Arc::new(Mutex::new(ConnectionState::Upgrading)),
            done: Done::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.context.id
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    /// Handle for observing the state from outside [`Connection::run`].
    pub fn state_handle(&self) -> Arc<Mutex<ConnectionState>> {
        Arc::clone(&self.state)
    }

    pub fn done(&self) -> Done {
        self.done.clone()
    }

    fn transition(&self, from: ConnectionState, to: ConnectionState) {
        let mut state = self.state.lock();
        if *state == from {
            *state = to;
        }
    }

    /// Drive the connection until the pumps and the handler have all exited.
    ///
    /// `sink` and `stream` are the two halves of the upgraded socket.
    pub async fn run<S, St, E>(
        self,
        sink: S,
        stream: St,
        invoker: Arc<dyn Invoker<C::Item>>,
    ) -> ConnectionReport
    where
        S: Sink<Message> + Unpin + Send + 'static,
        S::Error: Display + Send,
        St: Stream<Item = Result<Message, E>> + Unpin + Send + 'static,
        E: Display + Send + 'static,
    {
        let id = self.context.id;
        let path = self.context.path().to_string();
        let level = self.options.log_level;

        let (inbound_tx, inbound_rx) = mpsc::channel(self.options.recv_channel_buffer);
        let (outbound_tx, outbound_rx) = mpsc::channel(self.options.send_channel_buffer);
        let (disconnect_tx, disconnect_rx) = mpsc::channel(1);

        self.transition(ConnectionState::Upgrading, ConnectionState::Active);
        if level.allows(LogLevel::Info) {
            info!(conn_id = %id, path = %path, shape = ?invoker.shape(), "Socket connected");
        }

        let reader = tokio::spawn(read_pump(
            stream,
            Arc::clone(&self.codec),
            Arc::clone(&self.options),
            inbound_tx,
            self.done.clone(),
            id,
        ));
        let writer = tokio::spawn(write_pump(
            sink,
            Arc::clone(&self.codec),
            Arc::clone(&self.options),
            outbound_rx,
            disconnect_rx,
            self.done.clone(),
            id,
        ));

        let bindings = Bindings {
            context: self.context.clone(),
            receiver: inbound_rx,
            sender: outbound_tx,
            done: self.done.clone(),
            disconnect: Disconnect::new(disconnect_tx, self.done.clone()),
        };

        let closing = async {
            self.done.cancelled().await;
            self.transition(ConnectionState::Active, ConnectionState::Closing);
            if level.allows(LogLevel::Debug) {
                debug!(conn_id = %id, reason = ?self.done.reason(), "Socket closing");
            }
        };
        let (status, ()) = tokio::join!(run_handler(invoker, bindings), closing);

        let close_code = match writer.await {
            Ok(code) => code,
            Err(e) => {
                error!(conn_id = %id, error = %e, "Write pump task failed");
                None
            }
        };
        if let Err(e) = reader.await {
            error!(conn_id = %id, error = %e, "Read pump task failed");
        }

        self.transition(ConnectionState::Closing, ConnectionState::Closed);
        let reason = self.done.reason();
        if level.allows(LogLevel::Info) {
            info!(
                conn_id = %id,
                path = %path,
                status = status.as_u16(),
                reason = ?reason,
                close_code = ?close_code,
                "Socket closed"
            );
        }

        let report = ConnectionReport {
            id,
            status,
            reason,
            close_code,
        };
        if !report.is_success() {
            // Server errors are logged at every verbosity.
            if report.status.is_server_error() {
                error!(
                    conn_id = %id,
                    path = %path,
                    status = status.as_u16(),
                    reason = ?report.reason,
                    "Socket handler failed"
                );
            } else if level.allows(LogLevel::Warning) {
                warn!(
                    conn_id = %id,
                    path = %path,
                    status = status.as_u16(),
                    "Socket handler returned an error status"
                );
            }
        }
        report
    }
}

#[cfg(test)]
#[path = "connection_tests.rs"]
mod tests;
