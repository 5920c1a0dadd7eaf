//! Demo socket routes.

use std::time::Duration;

use axum::extract::ws::close_code;
use axum::http::StatusCode;
use axum::Router;
use serde::{Deserialize, Serialize};
use tracing::info;

use wsbridge_config::{ConfigError, OptionsOverride};
use wsbridge_sockets::{
    json, messages, socket, Disconnect, Done, Receiver, Sender, SocketContext,
};

/// Number of messages the sender routes push before disconnecting.
const SENDER_BURST: usize = 10;
const SENDER_INTERVAL: Duration = Duration::from_secs(1);
const GREETING: &str = "Hello World";

/// JSON payload used by the demo routes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Note {
    pub text: String,
}

/// Build the demo router. `overrides` apply to every route.
pub(crate) fn router(overrides: &OptionsOverride) -> Result<Router, ConfigError> {
    let overrides = std::slice::from_ref(overrides);

    Ok(Router::new()
        .route("/echo", socket(json::<Note>(), echo, overrides)?)
        .route("/receiver", socket(json::<Note>(), receive_notes, overrides)?)
        .route("/sender", socket(json::<Note>(), send_notes, overrides)?)
        .route("/strings/receiver", socket(messages(), receive_strings, overrides)?)
        .route("/strings/sender", socket(messages(), send_strings, overrides)?))
}

async fn echo(
    ctx: SocketContext,
    mut receiver: Receiver<Note>,
    sender: Sender<Note>,
    done: Done,
    _disconnect: Disconnect,
) -> StatusCode {
    loop {
        tokio::select! {
            _ = done.cancelled() => break,
            note = receiver.recv() => {
                let Some(note) = note else { break };
                if sender.send(note).await.is_err() {
                    break;
                }
            }
        }
    }
    info!(conn_id = %ctx.id, "Echo finished");
    StatusCode::OK
}

async fn receive_notes(ctx: SocketContext, mut receiver: Receiver<Note>, done: Done) -> StatusCode {
    loop {
        tokio::select! {
            _ = done.cancelled() => break,
            note = receiver.recv() => {
                let Some(note) = note else { break };
                info!(conn_id = %ctx.id, text = %note.text, "Note received");
            }
        }
    }
    StatusCode::OK
}

async fn receive_strings(ctx: SocketContext, mut receiver: Receiver<String>, done: Done) -> StatusCode {
    loop {
        tokio::select! {
            _ = done.cancelled() => break,
            text = receiver.recv() => {
                let Some(text) = text else { break };
                info!(conn_id = %ctx.id, text = %text, "Message received");
            }
        }
    }
    StatusCode::OK
}

/// Push `make()` every [`SENDER_INTERVAL`], then ask the peer to go away.
async fn push<T>(sender: Sender<T>, done: Done, disconnect: Disconnect, make: fn() -> T) -> StatusCode {
    let mut tick = tokio::time::interval(SENDER_INTERVAL);
    for _ in 0..SENDER_BURST {
        tokio::select! {
            _ = done.cancelled() => return StatusCode::OK,
            _ = tick.tick() => {
                if sender.send(make()).await.is_err() {
                    return StatusCode::OK;
                }
            }
        }
    }
    let _ = disconnect.send(close_code::AWAY).await;
    StatusCode::OK
}

async fn send_notes(_ctx: SocketContext, sender: Sender<Note>, done: Done, disconnect: Disconnect) -> StatusCode {
    push(sender, done, disconnect, || Note {
        text: GREETING.to_string(),
    })
    .await
}

async fn send_strings(
    _ctx: SocketContext,
    sender: Sender<String>,
    done: Done,
    disconnect: Disconnect,
) -> StatusCode {
    push(sender, done, disconnect, || GREETING.to_string()).await
}
