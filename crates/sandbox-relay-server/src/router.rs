//! Inbound message routing on the relay side.

use std::sync::Arc;

use futures::future::BoxFuture;
use sandbox_relay_core::{ActionTable, ConnectionId, Message, PendingCalls, RelayError};

use crate::{auth::Authenticator, registry::ConnectionRegistry};

/// What the connection driver should do after routing a frame.
pub enum Dispatch {
    /// Nothing to send.
    None,
    /// Send a reply.
    Reply(Message),
    /// Send a reply, then close the connection.
    ReplyAndClose(Message),
    /// Run an action handler; its future yields the response.
    Run(BoxFuture<'static, Message>),
}

impl std::fmt::Debug for Dispatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Reply(m) => f.debug_tuple("Reply").field(m).finish(),
            Self::ReplyAndClose(m) => f.debug_tuple("ReplyAndClose").field(m).finish(),
            Self::Run(_) => f.write_str("Run(..)"),
        }
    }
}

/// Classifies inbound envelopes and hands them to the pending-call table,
/// the local action table or the authentication hook.
pub struct Router {
    registry: Arc<ConnectionRegistry>,
    pending: PendingCalls,
    authenticator: Arc<dyn Authenticator>,
    actions: Arc<ActionTable>,
}

impl Router {
    #[must_use]
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        pending: PendingCalls,
        authenticator: Arc<dyn Authenticator>,
        actions: Arc<ActionTable>,
    ) -> Self {
        Self {
            registry,
            pending,
            authenticator,
            actions,
        }
    }

    /// Route one raw frame received on `conn`.
    pub async fn on_message(&self, conn: ConnectionId, raw: &str) -> Dispatch {
        let message = match Message::decode(raw) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(%conn, "dropping envelope: {e}");
                return Dispatch::None;
            }
        };
        tracing::debug!(%conn, kind = ?message.kind(), id = message.id(), "inbound envelope");

        match message {
            Message::Auth { id, credential } => self.on_auth(conn, id, &credential).await,
            Message::RegisterEndpoint { id, endpoint_id } => {
                match self.registry.register(conn, &endpoint_id) {
                    Ok(()) => {
                        tracing::info!(%conn, endpoint = %endpoint_id, "endpoint bound");
                        Dispatch::Reply(Message::register_ack(id, &endpoint_id))
                    }
                    Err(e) => {
                        tracing::warn!(%conn, endpoint = %endpoint_id, "registration refused: {e}");
                        Dispatch::Reply(Message::err(id, e))
                    }
                }
            }
            Message::Ping { id } => {
                self.registry.touch(conn);
                Dispatch::Reply(Message::Pong { id })
            }
            Message::Pong { .. } => {
                self.registry.touch(conn);
                Dispatch::None
            }
            Message::Call { id, action, params } => {
                if !self.registry.is_authenticated(conn) {
                    return Dispatch::Reply(Message::err(id, RelayError::NotAuthenticated));
                }
                Dispatch::Run(self.actions.invoke(id, action, params))
            }
            Message::Response { id, outcome } => {
                self.pending.settle_from(conn, &id, outcome);
                Dispatch::None
            }
            Message::Error { id, message } => {
                tracing::warn!(%conn, id = id.as_deref(), "peer reported error: {message}");
                if let Some(id) = id {
                    self.pending
                        .settle_from(conn, &id, Err(RelayError::from_wire(&message)));
                }
                Dispatch::None
            }
        }
    }

    async fn on_auth(&self, conn: ConnectionId, id: String, credential: &str) -> Dispatch {
        match self.authenticator.verify(credential).await {
            Some(identity) => {
                if !self.registry.authenticate(conn, identity.clone()) {
                    return Dispatch::None;
                }
                tracing::info!(%conn, %identity, "connection authenticated");
                Dispatch::Reply(Message::auth_ack(id, &identity))
            }
            None => {
                tracing::warn!(%conn, "authentication failed, closing connection");
                self.registry.deauthenticate_and_remove(conn);
                Dispatch::ReplyAndClose(Message::err(id, RelayError::NotAuthenticated))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use sandbox_relay_core::{ActionError, EnvelopeKind};
    use serde_json::json;
    use tokio::sync::mpsc;

    use super::*;
    use crate::{auth::SharedSecret, connection::ConnectionState};

    struct Fixture {
        router: Router,
        registry: Arc<ConnectionRegistry>,
        pending: PendingCalls,
        conn: ConnectionId,
        _rx: mpsc::UnboundedReceiver<crate::connection::Outbound>,
    }

    fn fixture() -> Fixture {
        let pending = PendingCalls::default();
        let registry = Arc::new(ConnectionRegistry::new(pending.clone()));
        let actions = ActionTable::new()
            .with_fn("echo", |params| async move { Ok::<_, ActionError>(params) });
        let router = Router::new(
            Arc::clone(&registry),
            pending.clone(),
            Arc::new(SharedSecret::new("tok-1")),
            Arc::new(actions),
        );
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = registry.accept(tx);
        Fixture {
            router,
            registry,
            pending,
            conn,
            _rx: rx,
        }
    }

    fn reply(dispatch: Dispatch) -> Message {
        match dispatch {
            Dispatch::Reply(m) => m,
            other => panic!("expected reply, got {other:?}"),
        }
    }

    async fn handshake(f: &Fixture) {
        let ack = reply(
            f.router
                .on_message(f.conn, r#"{"kind":"auth","id":"a1","credential":"tok-1"}"#)
                .await,
        );
        assert_eq!(ack.kind(), EnvelopeKind::Response);
        let ack = reply(
            f.router
                .on_message(f.conn, r#"{"kind":"register-endpoint","id":"r1","endpointId":"ws-a"}"#)
                .await,
        );
        assert_eq!(ack, Message::register_ack("r1".into(), "ws-a"));
    }

    #[tokio::test]
    async fn test_auth_then_register() {
        let f = fixture();
        handshake(&f).await;
        assert_eq!(f.registry.state(f.conn), ConnectionState::Bound);
        assert_eq!(f.registry.list_endpoints(), vec!["ws-a"]);
    }

    #[tokio::test]
    async fn test_bad_credential_closes() {
        let f = fixture();
        let dispatch = f
            .router
            .on_message(f.conn, r#"{"kind":"auth","id":"a1","credential":"nope"}"#)
            .await;
        let msg = match dispatch {
            Dispatch::ReplyAndClose(msg) => msg,
            other => panic!("expected close, got {other:?}"),
        };
        assert_eq!(msg, Message::err("a1".into(), RelayError::NotAuthenticated));
        assert!(!f.registry.contains(f.conn));
    }

    #[tokio::test]
    async fn test_failed_reauth_closes_bound_connection() {
        let f = fixture();
        handshake(&f).await;
        let call = f.pending.create(f.conn, Duration::from_secs(5)).unwrap();

        let dispatch = f
            .router
            .on_message(f.conn, r#"{"kind":"auth","id":"a2","credential":"nope"}"#)
            .await;
        let Dispatch::ReplyAndClose(msg) = dispatch else {
            panic!("expected close, got {dispatch:?}");
        };
        assert_eq!(msg, Message::err("a2".into(), RelayError::NotAuthenticated));
        assert!(!f.registry.contains(f.conn));
        assert!(f.registry.list_endpoints().is_empty());
        assert_eq!(call.wait().await, Err(RelayError::ConnectionLost));
    }

    #[tokio::test]
    async fn test_register_before_auth_is_refused() {
        let f = fixture();
        let msg = reply(
            f.router
                .on_message(f.conn, r#"{"kind":"register-endpoint","id":"r1","endpointId":"ws-a"}"#)
                .await,
        );
        assert_eq!(msg, Message::err("r1".into(), RelayError::NotAuthenticated));
    }

    #[tokio::test]
    async fn test_ping_replies_pong() {
        let f = fixture();
        let msg = reply(f.router.on_message(f.conn, r#"{"kind":"ping","id":"p1"}"#).await);
        assert_eq!(msg, Message::Pong { id: Some("p1".into()) });
        assert!(matches!(
            f.router.on_message(f.conn, r#"{"kind":"pong"}"#).await,
            Dispatch::None
        ));
    }

    #[tokio::test]
    async fn test_call_requires_authentication() {
        let f = fixture();
        let raw = r#"{"kind":"call","id":"c1","action":"echo","params":{"x":1}}"#;
        let msg = reply(f.router.on_message(f.conn, raw).await);
        assert_eq!(msg, Message::err("c1".into(), RelayError::NotAuthenticated));

        handshake(&f).await;
        let Dispatch::Run(fut) = f.router.on_message(f.conn, raw).await else {
            panic!("expected handler run");
        };
        assert_eq!(fut.await, Message::ok("c1".into(), json!({"x": 1})));
    }

    #[tokio::test]
    async fn test_response_settles_pending_call() {
        let f = fixture();
        handshake(&f).await;
        let call = f.pending.create(f.conn, Duration::from_secs(5)).unwrap();
        let raw = format!(r#"{{"kind":"response","id":"{}","result":{{"ok":true}}}}"#, call.id());
        assert!(matches!(f.router.on_message(f.conn, &raw).await, Dispatch::None));
        assert_eq!(call.wait().await, Ok(json!({"ok": true})));
    }

    #[tokio::test]
    async fn test_error_envelope_settles_pending_call() {
        let f = fixture();
        let call = f.pending.create(f.conn, Duration::from_secs(5)).unwrap();
        let raw = format!(r#"{{"kind":"error","id":"{}","error":"ConnectionLost"}}"#, call.id());
        f.router.on_message(f.conn, &raw).await;
        assert_eq!(call.wait().await, Err(RelayError::ConnectionLost));
    }

    #[tokio::test]
    async fn test_malformed_envelope_is_dropped() {
        let f = fixture();
        for raw in ["{", r#"{"kind":"call"}"#, r#"{"kind":"nope"}"#] {
            assert!(matches!(f.router.on_message(f.conn, raw).await, Dispatch::None));
        }
        assert!(f.registry.contains(f.conn));
    }
}
