//! Per-connection driver task.

use std::sync::Arc;

use futures::{SinkExt, StreamExt, stream::FuturesUnordered};
use sandbox_relay_core::{ConnectionId, FrameTransport, Message, TransportError};
use tokio::sync::mpsc;

use crate::{Relay, connection::Outbound, router::Dispatch};

/// Drive one connection until the transport closes or the relay closes it.
///
/// Inbound frames are routed in arrival order. Action handlers run
/// concurrently inside this task and are first polled in arrival order.
/// On exit the connection is removed from the registry, which evicts its
/// in-flight calls.
pub async fn serve_connection<T: FrameTransport>(relay: Arc<Relay>, transport: T) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let conn = relay.registry().accept(tx);
    tracing::info!(%conn, "connection accepted");

    let (mut sink, mut stream) = transport.split::<String>();
    let mut running = FuturesUnordered::new();

    let reason = loop {
        tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(raw)) => match relay.router().on_message(conn, &raw).await {
                    Dispatch::None => {}
                    Dispatch::Reply(message) => {
                        if send(&mut sink, conn, message).await.is_err() {
                            break "send failed";
                        }
                    }
                    Dispatch::ReplyAndClose(message) => {
                        let _ = send(&mut sink, conn, message).await;
                        break "authentication failed";
                    }
                    Dispatch::Run(handler) => running.push(handler),
                },
                Some(Err(e)) => {
                    tracing::warn!(%conn, "transport error: {e}");
                    break "transport error";
                }
                None => break "closed by peer",
            },
            command = rx.recv() => match command {
                Some(Outbound::Frame(message)) => {
                    if send(&mut sink, conn, message).await.is_err() {
                        break "send failed";
                    }
                }
                Some(Outbound::Close { reason }) => break reason,
                None => break "removed from registry",
            },
            Some(response) = running.next(), if !running.is_empty() => {
                if send(&mut sink, conn, response).await.is_err() {
                    break "send failed";
                }
            }
        }
    };

    relay.registry().remove(conn);
    let _ = sink.close().await;
    tracing::info!(%conn, reason, abandoned = running.len(), "connection closed");
}

async fn send<S>(sink: &mut S, conn: ConnectionId, message: Message) -> Result<(), TransportError>
where
    S: futures::Sink<String, Error = TransportError> + Unpin,
{
    let raw = match message.encode() {
        Ok(raw) => raw,
        Err(e) => {
            tracing::error!(%conn, "failed to encode message: {e}");
            return Ok(());
        }
    };
    tracing::debug!(%conn, kind = ?message.kind(), id = message.id(), "outbound envelope");
    sink.send(raw).await
}
