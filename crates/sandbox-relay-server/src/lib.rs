//! Relay side of the sandbox relay.
//!
//! Provides:
//! - Connection registry and endpoint selection
//! - Inbound routing and authentication hook
//! - Heartbeat monitor
//! - `Relay` call facade for the calling agent
//! - WebSocket transport and HTTP surface (feature: websocket)

pub mod auth;
pub mod config;
pub mod connection;
pub mod heartbeat;
pub mod registry;
pub mod relay;
pub mod router;
pub mod session;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use auth::{AllowAll, Authenticator, Identity, SharedSecret};
pub use config::RelayConfig;
pub use connection::{ConnectionRecord, ConnectionState};
pub use heartbeat::{HeartbeatGuard, HeartbeatMonitor};
pub use registry::{ConnectionRegistry, RegistryCounts, ResolvedEndpoint};
pub use relay::{LIST_ENDPOINTS_ACTION, Relay, RelayStatus};
pub use router::{Dispatch, Router};
pub use session::serve_connection;
