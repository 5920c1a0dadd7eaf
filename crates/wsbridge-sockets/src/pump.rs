//! Read and write pumps.
//!
//! Each connection runs exactly one of each. The read pump owns the inbound
//! half of the socket and the write pump owns the outbound half; the write
//! pump is the only task that ever writes a close frame or closes the socket.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{close_code, CloseFrame, Message, Utf8Bytes};
use bytes::Bytes;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, warn};
use uuid::Uuid;

use wsbridge_config::{LogLevel, Options};

use crate::codec::{to_frame, Codec};
use crate::done::{CloseReason, Done};
use crate::error::SocketError;

/// Record a fatal pump error as the close reason.
fn fail(done: &Done, options: &Options, conn_id: Uuid, pump: &'static str, err: SocketError) {
    if options.log_level.allows(LogLevel::Warning) {
        warn!(conn_id = %conn_id, pump, error = %err, "Connection failed");
    }
    done.signal(CloseReason::Failed(err));
}

fn decode_frame<C: Codec>(codec: &C, max: usize, payload: &[u8]) -> Result<C::Item, SocketError> {
    if payload.len() > max {
        return Err(SocketError::MessageTooLarge {
            size: payload.len(),
            max,
        });
    }
    codec.decode(payload)
}

/// Decode inbound frames onto `inbound` until the connection closes.
///
/// The read deadline is `pong_wait` from the last frame of any kind. A full
/// `inbound` channel blocks this pump, which stops reading from the socket.
pub(crate) async fn read_pump<C, St, E>(
    mut stream: St,
    codec: Arc<C>,
    options: Arc<Options>,
    inbound: mpsc::Sender<C::Item>,
    done: Done,
    conn_id: Uuid,
) where
    C: Codec,
    St: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let verbose = options.log_level.allows(LogLevel::Debug);
    let mut delivering = true;

    loop {
        let next = tokio::select! {
            biased;
            _ = done.cancelled() => break,
            next = time::timeout(options.pong_wait, stream.next()) => next,
        };

        let message = match next {
            Err(_) => {
                fail(&done, &options, conn_id, "read", SocketError::ReadTimeout(options.pong_wait));
                break;
            }
            Ok(None) => {
                done.signal(CloseReason::PeerClosed(None));
                break;
            }
            Ok(Some(Err(e))) => {
                fail(&done, &options, conn_id, "read", SocketError::Transport(e.to_string()));
                break;
            }
            Ok(Some(Ok(message))) => message,
        };

        let decoded = match message {
            Message::Text(text) => {
                decode_frame(&*codec, options.max_message_size, text.as_str().as_bytes())
            }
            Message::Binary(data) => decode_frame(&*codec, options.max_message_size, &data),
            Message::Ping(_) | Message::Pong(_) => {
                if verbose {
                    debug!(conn_id = %conn_id, "Control frame received");
                }
                continue;
            }
            Message::Close(frame) => {
                let code = frame.map(|f| f.code);
                if verbose {
                    debug!(conn_id = %conn_id, code = ?code, "Close frame received");
                }
                done.signal(CloseReason::PeerClosed(code));
                break;
            }
        };

        let item = match decoded {
            Ok(item) => item,
            Err(e) => {
                fail(&done, &options, conn_id, "read", e);
                break;
            }
        };

        if !delivering {
            continue;
        }

        tokio::select! {
            biased;
            _ = done.cancelled() => break,
            sent = inbound.send(item) => {
                if sent.is_err() {
                    // Handler dropped its receiver; keep reading for liveness.
                    delivering = false;
                    if verbose {
                        debug!(conn_id = %conn_id, "Receiver dropped, discarding inbound messages");
                    }
                }
            }
        }
    }

    if verbose {
        debug!(conn_id = %conn_id, "Read pump stopped");
    }
}

async fn write_frame<S>(sink: &mut S, frame: Message, wait: Duration) -> Result<(), SocketError>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    match time::timeout(wait, sink.send(frame)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(SocketError::Transport(e.to_string())),
        Err(_) => Err(SocketError::WriteTimeout(wait)),
    }
}

async fn write_item<C, S>(
    sink: &mut S,
    codec: &C,
    item: C::Item,
    wait: Duration,
) -> Result<(), SocketError>
where
    C: Codec,
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let frame = to_frame(codec, &item)?;
    write_frame(sink, frame, wait).await
}

/// Write whatever the handler queued before asking to close.
async fn flush_queued<C, S>(
    sink: &mut S,
    codec: &C,
    outbound: &mut mpsc::Receiver<C::Item>,
    options: &Options,
) -> Result<(), SocketError>
where
    C: Codec,
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    for _ in 0..options.send_channel_buffer {
        let Ok(item) = outbound.try_recv() else {
            break;
        };
        write_item(sink, codec, item, options.write_wait).await?;
    }
    Ok(())
}

/// Multiplex outbound messages, keep-alive pings and close requests onto
/// the socket.
///
/// Returns the close code written to the peer, or `None` when the peer
/// closed first and the transport answers its close frame.
pub(crate) async fn write_pump<C, S>(
    mut sink: S,
    codec: Arc<C>,
    options: Arc<Options>,
    mut outbound: mpsc::Receiver<C::Item>,
    mut disconnect: mpsc::Receiver<u16>,
    done: Done,
    conn_id: Uuid,
) -> Option<u16>
where
    C: Codec,
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let verbose = options.log_level.allows(LogLevel::Debug);
    let mut ping = time::interval_at(Instant::now() + options.ping_period, options.ping_period);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // Disconnect is polled before done so a handler that requests a close
    // and then returns gets its own code on the wire.
    let close_code = loop {
        tokio::select! {
            biased;
            Some(code) = disconnect.recv() => {
                done.signal(CloseReason::Disconnect(code));
                if let Err(e) = flush_queued(&mut sink, &*codec, &mut outbound, &options).await {
                    fail(&done, &options, conn_id, "write", e);
                }
                break Some(code);
            }
            _ = done.cancelled() => {
                break match done.reason() {
                    Some(CloseReason::PeerClosed(_)) => None,
                    Some(CloseReason::Failed(e)) => Some(e.close_code()),
                    Some(CloseReason::Disconnect(code)) => {
                        if let Err(e) = flush_queued(&mut sink, &*codec, &mut outbound, &options).await {
                            fail(&done, &options, conn_id, "write", e);
                        }
                        Some(code)
                    }
                    Some(CloseReason::HandlerReturned) | None => {
                        if let Err(e) = flush_queued(&mut sink, &*codec, &mut outbound, &options).await {
                            fail(&done, &options, conn_id, "write", e);
                        }
                        Some(close_code::AWAY)
                    }
                };
            }
            Some(item) = outbound.recv() => {
                if let Err(e) = write_item(&mut sink, &*codec, item, options.write_wait).await {
                    let code = e.close_code();
                    fail(&done, &options, conn_id, "write", e);
                    break Some(code);
                }
            }
            _ = ping.tick() => {
                if verbose {
                    debug!(conn_id = %conn_id, "Sending ping");
                }
                if let Err(e) = write_frame(&mut sink, Message::Ping(Bytes::new()), options.write_wait).await {
                    let code = e.close_code();
                    fail(&done, &options, conn_id, "write", e);
                    break Some(code);
                }
            }
        }
    };

    if let Some(code) = close_code {
        let frame = Message::Close(Some(CloseFrame {
            code,
            reason: Utf8Bytes::from_static(""),
        }));
        if let Err(e) = write_frame(&mut sink, frame, options.write_wait).await {
            if verbose {
                debug!(conn_id = %conn_id, error = %e, "Close frame not delivered");
            }
        }
    }

    if let Ok(Err(e)) = time::timeout(options.write_wait, sink.close()).await {
        if verbose {
            debug!(conn_id = %conn_id, error = %e, "Socket close failed");
        }
    }

    if verbose {
        debug!(conn_id = %conn_id, close_code = ?close_code, "Write pump stopped");
    }
    close_code
}

#[cfg(test)]
#[path = "pump_tests.rs"]
mod tests;
