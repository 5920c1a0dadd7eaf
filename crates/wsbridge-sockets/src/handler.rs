//! Handler adapter.
//!
//! A handler is any async function taking one of a closed set of parameter
//! shapes (see [`HandlerShape`]) and returning a [`StatusCode`]. There are
//! two ways to register one, and both end up behind [`Invoker`]:
//!
//! - **Generic path**: pass an async closure or `fn`. [`IntoInvoker`] picks
//!   the shape from the closure's parameter types once, at registration.
//! - **Fast path**: implement [`Invoker`] on your own type and pass it as-is.
//!
//! ```ignore
//! use wsbridge_sockets::{json, socket, Done, Receiver, SocketContext};
//! use axum::http::StatusCode;
//!
//! let route = socket(json::<Message>(), |_ctx: SocketContext, mut rx: Receiver<Message>, done: Done| async move {
//!     loop {
//!         tokio::select! {
//!             Some(msg) = rx.recv() => println!("{:?}", msg),
//!             _ = done.cancelled() => return StatusCode::OK,
//!         }
//!     }
//! }, &[])?;
//! ```

use std::any::Any;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::StatusCode;
use futures::future::{self, BoxFuture};
use futures::FutureExt;
use tokio::sync::mpsc;
use tracing::error;

use crate::context::SocketContext;
use crate::done::{CloseReason, Done};
use crate::error::SocketError;

/// Decoded inbound messages, in arrival order.
pub type Receiver<T> = mpsc::Receiver<T>;

/// Outbound messages, written in FIFO order.
pub type Sender<T> = mpsc::Sender<T>;

/// Asks the connection to close with a specific close code.
///
/// A successful request also fires the connection's [`Done`], so the close
/// reason reflects the request even if the handler returns right after.
#[derive(Debug, Clone)]
pub struct Disconnect {
    tx: mpsc::Sender<u16>,
    done: Done,
}

impl Disconnect {
    pub(crate) fn new(tx: mpsc::Sender<u16>, done: Done) -> Self {
        Self { tx, done }
    }

    /// Request a close with `code`. Fails once the connection has closed.
    pub async fn send(&self, code: u16) -> Result<(), SocketError> {
        self.tx.send(code).await.map_err(|_| SocketError::Closed)?;
        self.done.signal(CloseReason::Disconnect(code));
        Ok(())
    }

    /// Like [`Disconnect::send`] but never waits for the slot.
    pub fn try_send(&self, code: u16) -> Result<(), SocketError> {
        self.tx.try_send(code).map_err(|_| SocketError::Closed)?;
        self.done.signal(CloseReason::Disconnect(code));
        Ok(())
    }
}

/// Which channels a handler takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerShape {
    /// `(SocketContext, Receiver<T>, Done)`
    Sink,
    /// `(SocketContext, Sender<T>, Done)`
    Source,
    /// `(SocketContext, Receiver<T>, Done, Disconnect)`
    SinkWithDisconnect,
    /// `(SocketContext, Sender<T>, Done, Disconnect)`
    SourceWithDisconnect,
    /// `(SocketContext, Receiver<T>, Sender<T>, Done, Disconnect)`
    Duplex,
}

impl HandlerShape {
    pub fn receives(self) -> bool {
        matches!(self, Self::Sink | Self::SinkWithDisconnect | Self::Duplex)
    }

    pub fn sends(self) -> bool {
        matches!(self, Self::Source | Self::SourceWithDisconnect | Self::Duplex)
    }

    pub fn disconnects(self) -> bool {
        matches!(
            self,
            Self::SinkWithDisconnect | Self::SourceWithDisconnect | Self::Duplex
        )
    }
}

/// Arguments bound for one handler invocation, one variant per shape.
pub enum HandlerArgs<T> {
    Sink {
        context: SocketContext,
        receiver: Receiver<T>,
        done: Done,
    },
    Source {
        context: SocketContext,
        sender: Sender<T>,
        done: Done,
    },
    SinkWithDisconnect {
        context: SocketContext,
        receiver: Receiver<T>,
        done: Done,
        disconnect: Disconnect,
    },
    SourceWithDisconnect {
        context: SocketContext,
        sender: Sender<T>,
        done: Done,
        disconnect: Disconnect,
    },
    Duplex {
        context: SocketContext,
        receiver: Receiver<T>,
        sender: Sender<T>,
        done: Done,
        disconnect: Disconnect,
    },
}

impl<T> HandlerArgs<T> {
    pub fn shape(&self) -> HandlerShape {
        match self {
            Self::Sink { .. } => HandlerShape::Sink,
            Self::Source { .. } => HandlerShape::Source,
            Self::SinkWithDisconnect { .. } => HandlerShape::SinkWithDisconnect,
            Self::SourceWithDisconnect { .. } => HandlerShape::SourceWithDisconnect,
            Self::Duplex { .. } => HandlerShape::Duplex,
        }
    }
}

/// Something that can run a handler for one connection.
#[async_trait]
pub trait Invoker<T: Send + 'static>: Send + Sync + 'static {
    /// The shape of [`HandlerArgs`] this invoker expects. Must not change.
    fn shape(&self) -> HandlerShape;

    /// Run the handler to completion.
    async fn invoke(&self, args: HandlerArgs<T>) -> StatusCode;
}

/// Conversion into a shared [`Invoker`]. `M` is a marker that lets one type
/// implement this for several closure signatures.
pub trait IntoInvoker<T: Send + 'static, M> {
    fn into_invoker(self) -> Arc<dyn Invoker<T>>;
}

/// Marker for types that already implement [`Invoker`].
pub struct Direct;

impl<T, I> IntoInvoker<T, Direct> for I
where
    T: Send + 'static,
    I: Invoker<T>,
{
    fn into_invoker(self) -> Arc<dyn Invoker<T>> {
        Arc::new(self)
    }
}

type Call<T> = Box<dyn Fn(HandlerArgs<T>) -> BoxFuture<'static, StatusCode> + Send + Sync>;

/// Invoker built from a closure; the shape was fixed at conversion time.
struct FnInvoker<T> {
    shape: HandlerShape,
    call: Call<T>,
}

#[async_trait]
impl<T: Send + 'static> Invoker<T> for FnInvoker<T> {
    fn shape(&self) -> HandlerShape {
        self.shape
    }

    async fn invoke(&self, args: HandlerArgs<T>) -> StatusCode {
        (self.call)(args).await
    }
}

fn mismatched<T>(expected: HandlerShape, args: HandlerArgs<T>) -> BoxFuture<'static, StatusCode> {
    error!(expected = ?expected, got = ?args.shape(), "Handler invoked with the wrong shape");
    future::ready(StatusCode::INTERNAL_SERVER_ERROR).boxed()
}

macro_rules! impl_into_invoker {
    ($marker:ident, $shape:ident, ($($param:ident: $ty:ty),+)) => {
        #[doc = concat!("Marker for closures of shape [`HandlerShape::", stringify!($shape), "`].")]
        pub struct $marker;

        impl<T, F, Fut> IntoInvoker<T, $marker> for F
        where
            T: Send + 'static,
            F: Fn($($ty),+) -> Fut + Send + Sync + 'static,
            Fut: Future<Output = StatusCode> + Send + 'static,
        {
            fn into_invoker(self) -> Arc<dyn Invoker<T>> {
                Arc::new(FnInvoker {
                    shape: HandlerShape::$shape,
                    call: Box::new(move |args| match args {
                        HandlerArgs::$shape { $($param),+ } => self($($param),+).boxed(),
                        other => mismatched(HandlerShape::$shape, other),
                    }),
                })
            }
        }
    };
}

impl_into_invoker!(SinkFn, Sink, (context: SocketContext, receiver: Receiver<T>, done: Done));
impl_into_invoker!(SourceFn, Source, (context: SocketContext, sender: Sender<T>, done: Done));
impl_into_invoker!(
    SinkWithDisconnectFn,
    SinkWithDisconnect,
    (context: SocketContext, receiver: Receiver<T>, done: Done, disconnect: Disconnect)
);
impl_into_invoker!(
    SourceWithDisconnectFn,
    SourceWithDisconnect,
    (context: SocketContext, sender: Sender<T>, done: Done, disconnect: Disconnect)
);
impl_into_invoker!(
    DuplexFn,
    Duplex,
    (context: SocketContext, receiver: Receiver<T>, sender: Sender<T>, done: Done, disconnect: Disconnect)
);

/// Every channel of a live connection, before binding to a shape.
pub(crate) struct Bindings<T> {
    pub context: SocketContext,
    pub receiver: Receiver<T>,
    pub sender: Sender<T>,
    pub done: Done,
    pub disconnect: Disconnect,
}

/// Channels the handler's shape did not ask for.
struct Unused<T> {
    receiver: Option<Receiver<T>>,
    _sender: Option<Sender<T>>,
    _disconnect: Option<Disconnect>,
}

impl<T> Bindings<T> {
    fn bind(self, shape: HandlerShape) -> (HandlerArgs<T>, Unused<T>) {
        let Self {
            context,
            receiver,
            sender,
            done,
            disconnect,
        } = self;

        match shape {
            HandlerShape::Sink => (
                HandlerArgs::Sink { context, receiver, done },
                Unused { receiver: None, _sender: Some(sender), _disconnect: Some(disconnect) },
            ),
            HandlerShape::Source => (
                HandlerArgs::Source { context, sender, done },
                Unused { receiver: Some(receiver), _sender: None, _disconnect: Some(disconnect) },
            ),
            HandlerShape::SinkWithDisconnect => (
                HandlerArgs::SinkWithDisconnect { context, receiver, done, disconnect },
                Unused { receiver: None, _sender: Some(sender), _disconnect: None },
            ),
            HandlerShape::SourceWithDisconnect => (
                HandlerArgs::SourceWithDisconnect { context, sender, done, disconnect },
                Unused { receiver: Some(receiver), _sender: None, _disconnect: None },
            ),
            HandlerShape::Duplex => (
                HandlerArgs::Duplex { context, receiver, sender, done, disconnect },
                Unused { receiver: None, _sender: None, _disconnect: None },
            ),
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Run the handler on its own task and return its status.
///
/// Channels outside the handler's shape stay open until it returns; an
/// unclaimed receiver is drained so the read pump never blocks on it. When
/// the handler returns (or panics) the connection's done signal fires.
pub(crate) async fn run_handler<T: Send + 'static>(
    invoker: Arc<dyn Invoker<T>>,
    bindings: Bindings<T>,
) -> StatusCode {
    let done = bindings.done.clone();
    let conn_id = bindings.context.id;
    let (args, unused) = bindings.bind(invoker.shape());
    let Unused {
        receiver,
        _sender,
        _disconnect,
    } = unused;

    let mut handle = tokio::spawn(async move { invoker.invoke(args).await });

    let drain = async move {
        match receiver {
            Some(mut rx) => while rx.recv().await.is_some() {},
            None => future::pending::<()>().await,
        }
    };
    tokio::pin!(drain);

    let finished = tokio::select! {
        joined = &mut handle => Some(joined),
        _ = &mut drain => None,
    };
    let joined = match finished {
        Some(joined) => joined,
        None => handle.await,
    };

    match joined {
        Ok(status) => {
            done.signal(CloseReason::HandlerReturned);
            status
        }
        Err(e) => {
            let message = if e.is_panic() {
                panic_message(e.into_panic())
            } else {
                e.to_string()
            };
            error!(conn_id = %conn_id, error = %message, "Socket handler failed");
            done.signal(CloseReason::Failed(SocketError::HandlerPanic(message)));
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

#[cfg(test)]
#[path = "handler_tests.rs"]
mod tests;
