//! Per-connection bookkeeping.

use sandbox_relay_core::{ConnectionId, Message};
use serde::Serialize;
use tokio::{sync::mpsc, time::Instant};

/// Lifecycle of a connection record.
///
/// `Closed` is never stored: a closed connection is removed from the
/// registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Transport accepted, no valid credential yet.
    Connecting,
    /// Credential verified.
    Authenticated,
    /// Bound to an endpoint id.
    Bound,
    Closed,
}

/// Command for a connection's driver task.
#[derive(Debug)]
pub enum Outbound {
    /// Write a message.
    Frame(Message),
    /// Close the transport.
    Close { reason: &'static str },
}

/// State for one physical duplex channel.
#[derive(Debug)]
pub struct ConnectionRecord {
    pub id: ConnectionId,
    pub state: ConnectionState,
    /// Identity claim from the authentication hook.
    pub identity: Option<String>,
    pub endpoint_id: Option<String>,
    /// Registry-wide sequence of the last `register-endpoint`.
    pub bound_seq: u64,
    pub last_liveness: Instant,
    pub accepted_at: Instant,
    pub(crate) outbound: mpsc::UnboundedSender<Outbound>,
}

impl ConnectionRecord {
    pub(crate) fn new(id: ConnectionId, outbound: mpsc::UnboundedSender<Outbound>) -> Self {
        Self {
            id,
            state: ConnectionState::Connecting,
            identity: None,
            endpoint_id: None,
            bound_seq: 0,
            last_liveness: Instant::now(),
            accepted_at: Instant::now(),
            outbound,
        }
    }

    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(
            self.state,
            ConnectionState::Authenticated | ConnectionState::Bound
        )
    }

    #[must_use]
    pub const fn is_bound(&self) -> bool {
        matches!(self.state, ConnectionState::Bound)
    }

    /// Queue a message for the driver. Returns false if the driver is gone.
    pub fn send(&self, message: Message) -> bool {
        self.outbound.send(Outbound::Frame(message)).is_ok()
    }

    pub(crate) fn close(&self, reason: &'static str) {
        let _ = self.outbound.send(Outbound::Close { reason });
    }
}
