use super::*;
use axum::http::{HeaderMap, Method, Uri};
use std::time::Duration;

struct Harness {
    bindings: Bindings<String>,
    inbound: mpsc::Sender<String>,
    outbound: mpsc::Receiver<String>,
    disconnect: mpsc::Receiver<u16>,
    done: Done,
}

fn harness(capacity: usize) -> Harness {
    let (inbound_tx, inbound_rx) = mpsc::channel(capacity);
    let (outbound_tx, outbound_rx) = mpsc::channel(capacity);
    let (disconnect_tx, disconnect_rx) = mpsc::channel(1);
    let done = Done::new();

    Harness {
        bindings: Bindings {
            context: SocketContext::new(Method::GET, Uri::from_static("/test"), HeaderMap::new()),
            receiver: inbound_rx,
            sender: outbound_tx,
            done: done.clone(),
            disconnect: Disconnect::new(disconnect_tx, done.clone()),
        },
        inbound: inbound_tx,
        outbound: outbound_rx,
        disconnect: disconnect_rx,
        done,
    }
}

/// Upper-cases every inbound message back to the peer.
struct Shout;

#[async_trait]
impl Invoker<String> for Shout {
    fn shape(&self) -> HandlerShape {
        HandlerShape::Duplex
    }

    async fn invoke(&self, args: HandlerArgs<String>) -> StatusCode {
        let HandlerArgs::Duplex {
            mut receiver,
            sender,
            ..
        } = args
        else {
            return StatusCode::INTERNAL_SERVER_ERROR;
        };
        while let Some(msg) = receiver.recv().await {
            if sender.send(msg.to_uppercase()).await.is_err() {
                break;
            }
        }
        StatusCode::OK
    }
}

async fn shout_fn(
    _ctx: SocketContext,
    mut receiver: Receiver<String>,
    sender: Sender<String>,
    _done: Done,
    _disconnect: Disconnect,
) -> StatusCode {
    while let Some(msg) = receiver.recv().await {
        if sender.send(msg.to_uppercase()).await.is_err() {
            break;
        }
    }
    StatusCode::OK
}

async fn run_shout(invoker: Arc<dyn Invoker<String>>) -> (StatusCode, Vec<String>) {
    let Harness {
        bindings,
        inbound,
        mut outbound,
        ..
    } = harness(8);

    let task = tokio::spawn(run_handler(invoker, bindings));
    for word in ["a", "b", "c"] {
        inbound.send(word.to_string()).await.unwrap();
    }
    drop(inbound);

    let status = task.await.unwrap();
    let mut seen = Vec::new();
    while let Ok(msg) = outbound.try_recv() {
        seen.push(msg);
    }
    (status, seen)
}

#[test]
fn test_closure_shapes_are_detected() {
    fn shape_of<M>(handler: impl IntoInvoker<String, M>) -> HandlerShape {
        handler.into_invoker().shape()
    }

    assert_eq!(
        shape_of(|_: SocketContext, _: Receiver<String>, _: Done| async { StatusCode::OK }),
        HandlerShape::Sink
    );
    assert_eq!(
        shape_of(|_: SocketContext, _: Sender<String>, _: Done| async { StatusCode::OK }),
        HandlerShape::Source
    );
    assert_eq!(
        shape_of(|_: SocketContext, _: Receiver<String>, _: Done, _: Disconnect| async {
            StatusCode::OK
        }),
        HandlerShape::SinkWithDisconnect
    );
    assert_eq!(
        shape_of(|_: SocketContext, _: Sender<String>, _: Done, _: Disconnect| async {
            StatusCode::OK
        }),
        HandlerShape::SourceWithDisconnect
    );
    assert_eq!(shape_of(shout_fn), HandlerShape::Duplex);
    assert_eq!(shape_of(Shout), HandlerShape::Duplex);
}

#[test]
fn test_shape_capabilities() {
    assert!(HandlerShape::Sink.receives());
    assert!(!HandlerShape::Sink.sends());
    assert!(HandlerShape::Source.sends());
    assert!(!HandlerShape::Source.disconnects());
    assert!(HandlerShape::SourceWithDisconnect.disconnects());
    assert!(HandlerShape::Duplex.receives() && HandlerShape::Duplex.sends());
}

#[tokio::test]
async fn test_generic_and_fast_paths_agree() {
    let generic = run_shout(shout_fn.into_invoker()).await;
    let fast = run_shout(Shout.into_invoker()).await;

    assert_eq!(generic, (StatusCode::OK, vec!["A".into(), "B".into(), "C".into()]));
    assert_eq!(generic, fast);
}

#[tokio::test]
async fn test_return_fires_done() {
    let Harness { bindings, done, .. } = harness(1);
    let invoker = (|_: SocketContext, _: Sender<String>, _: Done| async { StatusCode::ACCEPTED })
        .into_invoker();

    let status = run_handler(invoker, bindings).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(done.reason(), Some(CloseReason::HandlerReturned));
}

#[tokio::test]
async fn test_panic_is_reported_as_internal_error() {
    let Harness { bindings, done, .. } = harness(1);
    let invoker = (|_: SocketContext, _: Receiver<String>, _: Done| async {
        if true {
            panic!("handler blew up");
        }
        StatusCode::OK
    })
    .into_invoker();

    let status = run_handler(invoker, bindings).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        done.reason(),
        Some(CloseReason::Failed(SocketError::HandlerPanic(
            "handler blew up".into()
        )))
    );
}

#[tokio::test]
async fn test_source_handler_does_not_stall_inbound() {
    let Harness {
        bindings,
        inbound,
        done,
        ..
    } = harness(1);
    let invoker = (|_: SocketContext, _: Sender<String>, done: Done| async move {
        done.cancelled().await;
        StatusCode::OK
    })
    .into_invoker();

    let task = tokio::spawn(run_handler(invoker, bindings));

    // Capacity is 1, so these would block without the drain.
    for i in 0..5 {
        tokio::time::timeout(Duration::from_secs(1), inbound.send(i.to_string()))
            .await
            .expect("inbound send stalled")
            .unwrap();
    }

    done.signal(CloseReason::PeerClosed(Some(1000)));
    assert_eq!(task.await.unwrap(), StatusCode::OK);
}

#[tokio::test]
async fn test_sink_handler_keeps_outbound_open() {
    let Harness {
        bindings,
        mut outbound,
        mut disconnect,
        done,
        ..
    } = harness(1);
    let invoker = (|_: SocketContext, _: Receiver<String>, done: Done| async move {
        done.cancelled().await;
        StatusCode::OK
    })
    .into_invoker();

    let task = tokio::spawn(run_handler(invoker, bindings));

    let early = tokio::time::timeout(Duration::from_millis(20), outbound.recv()).await;
    assert!(early.is_err(), "outbound closed while the handler was running");
    let early = tokio::time::timeout(Duration::from_millis(20), disconnect.recv()).await;
    assert!(early.is_err(), "disconnect closed while the handler was running");

    done.signal(CloseReason::PeerClosed(None));
    task.await.unwrap();
    assert!(outbound.recv().await.is_none());
    assert!(disconnect.recv().await.is_none());
}

#[tokio::test]
async fn test_disconnect_after_close_fails() {
    let (tx, rx) = mpsc::channel(1);
    let done = Done::new();
    let disconnect = Disconnect::new(tx, done.clone());

    disconnect.try_send(4000).unwrap();
    assert_eq!(done.reason(), Some(CloseReason::Disconnect(4000)));
    assert!(matches!(disconnect.try_send(4001), Err(SocketError::Closed)));

    drop(rx);
    assert_eq!(disconnect.send(4002).await, Err(SocketError::Closed));
}
