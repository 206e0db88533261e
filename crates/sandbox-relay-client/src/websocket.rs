//! WebSocket connector built on tokio-tungstenite.

use std::{
    pin::Pin,
    task::{Context, Poll, ready},
};

use async_trait::async_trait;
use futures::{Sink, SinkExt, Stream, StreamExt};
use sandbox_relay_core::{TransportError, binary_frame_text};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{Error as WsError, Message as WsMessage},
};

use crate::Connector;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

fn io_error(e: &WsError) -> TransportError {
    match e {
        WsError::ConnectionClosed | WsError::AlreadyClosed => TransportError::Closed,
        other => TransportError::Io(other.to_string()),
    }
}

/// Text-frame view of a client websocket.
pub struct WsFrames {
    socket: Socket,
}

impl Stream for WsFrames {
    type Item = Result<String, TransportError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            let Some(frame) = ready!(self.socket.poll_next_unpin(cx)) else {
                return Poll::Ready(None);
            };
            match frame {
                Ok(WsMessage::Text(text)) => return Poll::Ready(Some(Ok(text.as_str().to_owned()))),
                Ok(WsMessage::Binary(data)) => {
                    if let Some(text) = binary_frame_text(&data) {
                        return Poll::Ready(Some(Ok(text)));
                    }
                }
                Ok(WsMessage::Close(_)) => return Poll::Ready(None),
                Ok(WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_)) => {}
                Err(e) => return Poll::Ready(Some(Err(io_error(&e)))),
            }
        }
    }
}

impl Sink<String> for WsFrames {
    type Error = TransportError;

    fn poll_ready(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.socket.poll_ready_unpin(cx).map_err(|e| io_error(&e))
    }

    fn start_send(mut self: Pin<&mut Self>, item: String) -> Result<(), Self::Error> {
        self.socket
            .start_send_unpin(WsMessage::Text(item.into()))
            .map_err(|e| io_error(&e))
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.socket.poll_flush_unpin(cx).map_err(|e| io_error(&e))
    }

    fn poll_close(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.socket.poll_close_unpin(cx).map_err(|e| io_error(&e))
    }
}

/// Connects to the relay's `/ws` route.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    url: String,
}

impl WebSocketConnector {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    type Transport = WsFrames;

    async fn connect(&self) -> Result<WsFrames, TransportError> {
        let (socket, _response) = connect_async(self.url.as_str())
            .await
            .map_err(|e| io_error(&e))?;
        tracing::debug!(url = %self.url, "websocket connected");
        Ok(WsFrames { socket })
    }
}
