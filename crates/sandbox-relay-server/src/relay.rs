//! Relay facade: the call-style API used by the calling agent.

use std::{sync::Arc, time::Duration};

use sandbox_relay_core::{
    ActionError, ActionTable, FrameTransport, Message, PendingCalls, RelayError,
};
use serde::Serialize;
use serde_json::{Value, json};
use tokio::task::JoinHandle;

use crate::{
    RelayConfig,
    auth::{AllowAll, Authenticator, SharedSecret},
    heartbeat::HeartbeatMonitor,
    registry::ConnectionRegistry,
    router::Router,
    session,
};

/// Built-in action: endpoints currently reachable through the relay.
pub const LIST_ENDPOINTS_ACTION: &str = "relay.listEndpoints";

/// Snapshot returned by [`Relay::status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayStatus {
    pub connections_total: usize,
    pub authenticated: usize,
    pub endpoints_live: usize,
    pub pending_calls: usize,
}

/// One relay instance: registry, pending calls and router.
///
/// Construct one per process and share it behind an `Arc`.
pub struct Relay {
    config: RelayConfig,
    registry: Arc<ConnectionRegistry>,
    pending: PendingCalls,
    router: Router,
}

impl Relay {
    /// Create a relay with no local actions beyond the built-ins.
    ///
    /// Uses [`SharedSecret`] when a secret is configured, [`AllowAll`]
    /// otherwise.
    #[must_use]
    pub fn new(config: RelayConfig) -> Arc<Self> {
        Self::with_actions(config, ActionTable::new())
    }

    /// Create a relay that also serves `actions` to authenticated peers.
    #[must_use]
    pub fn with_actions(config: RelayConfig, actions: ActionTable) -> Arc<Self> {
        let authenticator: Arc<dyn Authenticator> = match &config.shared_secret {
            Some(secret) => Arc::new(SharedSecret::new(secret.clone())),
            None => {
                tracing::warn!("no shared secret configured, accepting any credential");
                Arc::new(AllowAll)
            }
        };
        Self::with_parts(config, authenticator, actions)
    }

    /// Create a relay with a custom authentication hook.
    #[must_use]
    pub fn with_parts(
        config: RelayConfig,
        authenticator: Arc<dyn Authenticator>,
        mut actions: ActionTable,
    ) -> Arc<Self> {
        let pending = PendingCalls::new(config.max_pending_calls);
        let registry = Arc::new(ConnectionRegistry::new(pending.clone()));

        let listing = Arc::clone(&registry);
        actions.register_fn(LIST_ENDPOINTS_ACTION, move |_| {
            let endpoints = listing.list_endpoints();
            async move { Ok::<_, ActionError>(json!(endpoints)) }
        });

        let router = Router::new(
            Arc::clone(&registry),
            pending.clone(),
            authenticator,
            Arc::new(actions),
        );

        Arc::new(Self {
            config,
            registry,
            pending,
            router,
        })
    }

    /// Invoke `action` on a remote endpoint and wait for its result.
    ///
    /// `endpoint_id` pins the target; `None` picks the most recently
    /// registered endpoint. `timeout` defaults to the configured one.
    ///
    /// # Errors
    /// Fails fast with `EndpointUnreachable`, `NoEndpointsAvailable` or
    /// `TooManyPendingCalls`; otherwise returns the settlement: the remote
    /// error, `Timeout` or `ConnectionLost`.
    pub async fn call(
        &self,
        endpoint_id: Option<&str>,
        action: &str,
        params: Value,
        timeout: Option<Duration>,
    ) -> Result<Value, RelayError> {
        let target = self.registry.resolve(endpoint_id)?;
        let timeout = timeout.unwrap_or(self.config.default_call_timeout);
        let call = self.pending.create(target.connection, timeout)?;
        let id = call.id().to_string();

        tracing::debug!(
            call_id = %id,
            conn = %target.connection,
            endpoint = %target.endpoint_id,
            %action,
            "sending call"
        );
        let sent = target.send(Message::Call {
            id: id.clone(),
            action: action.to_string(),
            params,
        });
        // The connection may have been removed after resolve but before the
        // call was registered, in which case eviction missed it.
        if !sent || !self.registry.contains(target.connection) {
            self.pending.settle(&id, Err(RelayError::ConnectionLost));
        }

        call.wait().await
    }

    /// Endpoint ids currently reachable.
    #[must_use]
    pub fn list_endpoints(&self) -> Vec<String> {
        self.registry.list_endpoints()
    }

    #[must_use]
    pub fn status(&self) -> RelayStatus {
        let counts = self.registry.counts();
        RelayStatus {
            connections_total: counts.connections_total,
            authenticated: counts.authenticated,
            endpoints_live: counts.endpoints_live,
            pending_calls: self.pending.len(),
        }
    }

    /// Drive one transport until it closes.
    pub async fn serve<T: FrameTransport>(self: &Arc<Self>, transport: T) {
        session::serve_connection(Arc::clone(self), transport).await;
    }

    /// Start the heartbeat monitor with the configured interval.
    #[must_use]
    pub fn spawn_heartbeat(&self) -> JoinHandle<()> {
        HeartbeatMonitor::new(
            Arc::clone(&self.registry),
            self.config.heartbeat_interval,
            self.config.stale_after,
        )
        .with_auth_deadline(self.config.auth_deadline)
        .spawn()
    }

    #[must_use]
    pub const fn config(&self) -> &RelayConfig {
        &self.config
    }

    #[must_use]
    pub const fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    #[must_use]
    pub const fn router(&self) -> &Router {
        &self.router
    }
}
