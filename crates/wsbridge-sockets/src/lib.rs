//! # wsbridge Sockets
//!
//! Bridges a websocket connection to a pair of typed channels so handlers
//! only deal with values, never with frames, keep-alive or close handshakes.
//!
//! Each accepted connection runs:
//! - a read pump decoding frames onto the handler's [`Receiver`]
//! - a write pump encoding the handler's [`Sender`] output, pinging the peer
//!   and writing the single close frame
//! - the handler itself, on its own task
//!
//! All three observe one [`Done`] signal that fires on the first of handler
//! return, peer close, pump failure or a [`Disconnect`] request.
//!
//! ## Usage
//!
//! ```ignore
//! use axum::{http::StatusCode, Router};
//! use wsbridge_sockets::{messages, socket, Done, Receiver, SocketContext};
//!
//! async fn print(_ctx: SocketContext, mut rx: Receiver<String>, done: Done) -> StatusCode {
//!     loop {
//!         tokio::select! {
//!             Some(text) = rx.recv() => println!("{text}"),
//!             _ = done.cancelled() => return StatusCode::OK,
//!         }
//!     }
//! }
//!
//! let app: Router = Router::new().route("/print", socket(messages(), print, &[])?);
//! ```

mod codec;
mod connection;
mod context;
mod done;
mod error;
mod handler;
mod pump;
mod upgrade;

pub use codec::{json, messages, Codec, FrameKind, JsonCodec, RawCodec};
pub use connection::{Connection, ConnectionReport, ConnectionState};
pub use context::SocketContext;
pub use done::{CloseReason, Done};
pub use error::SocketError;
pub use handler::{
    Direct, Disconnect, DuplexFn, HandlerArgs, HandlerShape, IntoInvoker, Invoker, Receiver,
    Sender, SinkFn, SinkWithDisconnectFn, SourceFn, SourceWithDisconnectFn,
};
pub use upgrade::{socket, SocketRoute};

pub use wsbridge_config::{LogLevel, Options, OptionsOverride, OriginPolicy};
