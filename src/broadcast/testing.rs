//! In-memory transports for broadcast tests

use axum::extract::ws::Message;
use futures::channel::mpsc;
use futures::{future, sink, Sink, SinkExt};
use std::io;

use crate::models::LogEvent;

/// Sink that forwards every frame to the returned receiver
pub fn recording_sink() -> (
    impl Sink<Message, Error = axum::Error> + Send + 'static,
    mpsc::UnboundedReceiver<Message>,
) {
    let (tx, rx) = mpsc::unbounded();
    (tx.sink_map_err(|e| axum::Error::new(e)), rx)
}

/// Sink whose writes never complete
pub fn stalled_sink() -> impl Sink<Message, Error = axum::Error> + Send + 'static {
    sink::unfold((), |(), _msg: Message| future::pending::<Result<(), axum::Error>>())
}

/// Sink whose writes always fail
pub fn broken_sink() -> impl Sink<Message, Error = axum::Error> + Send + 'static {
    sink::unfold((), |(), _msg: Message| {
        future::ready(Err::<(), _>(axum::Error::new(io::Error::new(
            io::ErrorKind::BrokenPipe,
            "broken pipe",
        ))))
    })
}

/// Inbound frame source standing in for the read half of a socket
pub fn inbound() -> (
    mpsc::UnboundedSender<Result<Message, axum::Error>>,
    mpsc::UnboundedReceiver<Result<Message, axum::Error>>,
) {
    mpsc::unbounded()
}

/// Decode a text frame carrying a log event
pub fn decode_event(msg: &Message) -> Option<LogEvent> {
    match msg {
        Message::Text(text) => serde_json::from_str(text).ok(),
        _ => None,
    }
}

/// Drain every frame currently buffered in a recording sink
pub fn drain(rx: &mut mpsc::UnboundedReceiver<Message>) -> Vec<Message> {
    let mut frames = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        frames.push(msg);
    }
    frames
}
