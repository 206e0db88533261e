//! Remote-endpoint side of the sandbox relay.
//!
//! Provides:
//! - `ReconnectingClient` - Connect, authenticate, register, serve, reconnect
//! - `Backoff` - Exponential reconnect delay with a give-up threshold
//! - `WebSocketConnector` - tokio-tungstenite transport (feature: websocket)

pub mod backoff;
pub mod client;
pub mod config;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use backoff::Backoff;
pub use client::{ClientState, ClientStatus, Connector, FnConnector, ReconnectingClient};
pub use config::ClientConfig;

#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnector, WsFrames};
