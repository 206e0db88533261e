//! Relay configuration.

use std::{net::SocketAddr, time::Duration};

/// Relay configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Address the websocket/HTTP listener binds to.
    pub listen: SocketAddr,
    /// Shared secret remote endpoints must present. `None` accepts anyone.
    pub shared_secret: Option<String>,
    /// Interval between heartbeat pings.
    pub heartbeat_interval: Duration,
    /// Silence after which a connection is evicted.
    pub stale_after: Duration,
    /// How long a connection may stay unauthenticated before the heartbeat
    /// closes it.
    pub auth_deadline: Duration,
    /// Timeout for calls that do not specify one.
    pub default_call_timeout: Duration,
    /// Cap on in-flight calls. `None` is unbounded.
    pub max_pending_calls: Option<usize>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        let heartbeat_interval = Duration::from_secs(30);
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 8787)),
            shared_secret: None,
            heartbeat_interval,
            stale_after: heartbeat_interval * 2,
            auth_deadline: heartbeat_interval,
            default_call_timeout: Duration::from_secs(30),
            max_pending_calls: Some(1024),
        }
    }
}

impl RelayConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn with_listen(mut self, listen: SocketAddr) -> Self {
        self.listen = listen;
        self
    }

    #[must_use]
    pub fn with_shared_secret(mut self, secret: impl Into<String>) -> Self {
        self.shared_secret = Some(secret.into());
        self
    }

    /// Set the heartbeat interval; the stale threshold follows at twice it
    /// and the auth deadline at once it.
    #[must_use]
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self.stale_after = interval * 2;
        self.auth_deadline = interval;
        self
    }

    #[must_use]
    pub const fn with_auth_deadline(mut self, deadline: Duration) -> Self {
        self.auth_deadline = deadline;
        self
    }

    #[must_use]
    pub const fn with_default_call_timeout(mut self, timeout: Duration) -> Self {
        self.default_call_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_max_pending_calls(mut self, limit: Option<usize>) -> Self {
        self.max_pending_calls = limit;
        self
    }
}
