//! WebSocket transport and HTTP surface for the calling agent.

use std::{
    pin::Pin,
    sync::Arc,
    task::{Context, Poll, ready},
    time::Duration,
};

use axum::{
    Json, Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use futures::{Sink, SinkExt, Stream, StreamExt};
use sandbox_relay_core::{RelayError, TransportError, binary_frame_text};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{HeartbeatGuard, Relay, RelayStatus};

/// Adapts an axum [`WebSocket`] into a text-frame transport.
///
/// Valid UTF-8 binary frames are accepted as text; protocol-level
/// ping/pong frames are left to axum.
pub struct WsFrames {
    socket: WebSocket,
}

impl WsFrames {
    #[must_use]
    pub const fn new(socket: WebSocket) -> Self {
        Self { socket }
    }
}

fn io_error(e: &axum::Error) -> TransportError {
    TransportError::Io(e.to_string())
}

impl Stream for WsFrames {
    type Item = Result<String, TransportError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            let Some(frame) = ready!(self.socket.poll_next_unpin(cx)) else {
                return Poll::Ready(None);
            };
            match frame {
                Ok(Message::Text(text)) => return Poll::Ready(Some(Ok(text.as_str().to_owned()))),
                Ok(Message::Binary(data)) => {
                    if let Some(text) = binary_frame_text(&data) {
                        return Poll::Ready(Some(Ok(text)));
                    }
                }
                Ok(Message::Close(_)) => return Poll::Ready(None),
                Ok(Message::Ping(_) | Message::Pong(_)) => {}
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
            .start_send_unpin(Message::Text(item.into()))
            .map_err(|e| io_error(&e))
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.socket.poll_flush_unpin(cx).map_err(|e| io_error(&e))
    }

    fn poll_close(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.socket.poll_close_unpin(cx).map_err(|e| io_error(&e))
    }
}

/// Error body for the HTTP surface.
#[derive(Debug)]
pub struct ApiError(pub RelayError);

impl From<RelayError> for ApiError {
    fn from(e: RelayError) -> Self {
        Self(e)
    }
}

impl ApiError {
    const fn status(&self) -> StatusCode {
        match self.0 {
            RelayError::EndpointUnreachable(_) | RelayError::UnknownAction(_) => {
                StatusCode::NOT_FOUND
            }
            RelayError::NoEndpointsAvailable
            | RelayError::ConnectionLost
            | RelayError::TooManyPendingCalls { .. } => StatusCode::SERVICE_UNAVAILABLE,
            RelayError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            RelayError::HandlerFailed(_) | RelayError::Remote(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({ "error": self.0.to_wire(), "kind": self.0.kind() });
        (self.status(), Json(body)).into_response()
    }
}

/// Body of `POST /call`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRequest {
    pub endpoint_id: Option<String>,
    pub action: String,
    #[serde(default)]
    pub params: Value,
    pub timeout_ms: Option<u64>,
}

/// WebSocket upgrade handler for remote endpoints.
pub async fn ws_handler(ws: WebSocketUpgrade, State(relay): State<Arc<Relay>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move { relay.serve(WsFrames::new(socket)).await })
}

async fn status_handler(State(relay): State<Arc<Relay>>) -> Json<RelayStatus> {
    Json(relay.status())
}

async fn endpoints_handler(State(relay): State<Arc<Relay>>) -> Json<Vec<String>> {
    Json(relay.list_endpoints())
}

async fn call_handler(
    State(relay): State<Arc<Relay>>,
    Json(req): Json<CallRequest>,
) -> Result<Json<Value>, ApiError> {
    let result = relay
        .call(
            req.endpoint_id.as_deref(),
            &req.action,
            req.params,
            req.timeout_ms.map(Duration::from_millis),
        )
        .await?;
    Ok(Json(json!({ "result": result })))
}

/// Create the relay router.
///
/// # Example
/// ```ignore
/// let relay = Relay::new(RelayConfig::default());
/// let app = create_router(relay);
/// ```
#[must_use]
pub fn create_router(relay: Arc<Relay>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/status", get(status_handler))
        .route("/endpoints", get(endpoints_handler))
        .route("/call", post(call_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(relay)
}

/// Serve the relay on `listener` with its heartbeat monitor running.
///
/// The heartbeat stops when this future completes or is dropped.
///
/// # Errors
/// Returns error if the server fails.
pub async fn serve(relay: Arc<Relay>, listener: tokio::net::TcpListener) -> std::io::Result<()> {
    let _heartbeat = HeartbeatGuard::new(relay.spawn_heartbeat());
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("Relay listening on ws://{addr}/ws");
    }
    axum::serve(listener, create_router(relay)).await
}
