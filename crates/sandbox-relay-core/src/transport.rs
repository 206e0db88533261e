//! Text-frame transports.
//!
//! The relay and the client drive any duplex of text frames: a
//! `Stream` of inbound frames plus a `Sink` of outbound ones.
//! Websocket adapters live in the server and client crates.

use std::{
    pin::Pin,
    task::{Context, Poll},
};

use futures::{Sink, Stream, StreamExt, channel::mpsc};
use thiserror::Error;

use crate::RelayError;

/// Transport error.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("transport closed")]
    Closed,
    #[error("transport error: {0}")]
    Io(String),
}

impl From<TransportError> for RelayError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Closed => Self::ConnectionLost,
            TransportError::Io(msg) => Self::Transport(msg),
        }
    }
}

/// A duplex of text frames.
pub trait FrameTransport:
    Stream<Item = Result<String, TransportError>>
    + Sink<String, Error = TransportError>
    + Send
    + Unpin
    + 'static
{
}

impl<T> FrameTransport for T where
    T: Stream<Item = Result<String, TransportError>>
        + Sink<String, Error = TransportError>
        + Send
        + Unpin
        + 'static
{
}

/// Text carried by a binary websocket frame.
///
/// Both websocket adapters accept binary frames holding valid UTF-8 as
/// text frames. Anything else is dropped with a warning.
#[must_use]
pub fn binary_frame_text(data: &[u8]) -> Option<String> {
    match std::str::from_utf8(data) {
        Ok(text) => Some(text.to_owned()),
        Err(e) => {
            tracing::warn!(len = data.len(), "dropping non-UTF-8 binary frame: {e}");
            None
        }
    }
}

/// In-process transport.
///
/// Frames sent on one half arrive on the other in order. Closing either
/// half ends the peer's stream.
pub struct MemoryTransport {
    tx: mpsc::UnboundedSender<String>,
    rx: mpsc::UnboundedReceiver<String>,
}

impl MemoryTransport {
    /// Create two connected halves.
    #[must_use]
    pub fn pair() -> (Self, Self) {
        let (a_tx, b_rx) = mpsc::unbounded();
        let (b_tx, a_rx) = mpsc::unbounded();
        (Self { tx: a_tx, rx: a_rx }, Self { tx: b_tx, rx: b_rx })
    }
}

impl Stream for MemoryTransport {
    type Item = Result<String, TransportError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_next_unpin(cx).map(|frame| frame.map(Ok))
    }
}

impl Sink<String> for MemoryTransport {
    type Error = TransportError;

    fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        if self.tx.is_closed() {
            Poll::Ready(Err(TransportError::Closed))
        } else {
            Poll::Ready(Ok(()))
        }
    }

    fn start_send(self: Pin<&mut Self>, item: String) -> Result<(), Self::Error> {
        self.tx
            .unbounded_send(item)
            .map_err(|_| TransportError::Closed)
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.tx.close_channel();
        Poll::Ready(Ok(()))
    }
}
