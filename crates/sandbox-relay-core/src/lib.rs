//! Core building blocks of the sandbox relay protocol.
//!
//! This crate provides the pieces shared by both ends of a connection:
//! - `Message` / `Envelope` - Wire codec (JSON text frames)
//! - `PendingCalls` - Correlation of calls with responses, timeouts, eviction
//! - `ActionTable` - Handlers for actions the peer may invoke
//! - `MemoryTransport` - In-process duplex of text frames
//! - `RelayError` - Error taxonomy

pub mod envelope;
pub mod error;
pub mod handler;
pub mod pending;
pub mod transport;

pub use envelope::{Envelope, EnvelopeKind, Message};
pub use error::RelayError;
pub use handler::{ActionError, ActionHandler, ActionTable};
pub use pending::{CallOutcome, ConnectionId, PendingCall, PendingCalls};
pub use transport::{FrameTransport, MemoryTransport, TransportError, binary_frame_text};
