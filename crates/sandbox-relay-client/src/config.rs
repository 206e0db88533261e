//! Client configuration.

use std::time::Duration;

/// Configuration for a [`ReconnectingClient`](crate::ReconnectingClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Relay websocket URL.
    pub url: String,
    /// Logical endpoint id to register.
    pub endpoint_id: String,
    /// Credential presented in `auth`.
    pub credential: String,
    /// First reconnect delay.
    pub base_delay: Duration,
    /// Cap on the reconnect delay.
    pub max_delay: Duration,
    /// Consecutive failed attempts before giving up. 0 behaves as 1.
    pub max_attempts: u32,
    /// Bound on auth + registration.
    pub handshake_timeout: Duration,
    /// Interval between client pings. `None` disables the client heartbeat.
    pub heartbeat_interval: Option<Duration>,
    /// Timeout for calls to the relay that do not specify one.
    pub default_call_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8787/ws".to_string(),
            endpoint_id: "default".to_string(),
            credential: String::new(),
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_attempts: 10,
            handshake_timeout: Duration::from_secs(10),
            heartbeat_interval: Some(Duration::from_secs(30)),
            default_call_timeout: Duration::from_secs(30),
        }
    }
}

impl ClientConfig {
    #[must_use]
    pub fn new(
        url: impl Into<String>,
        endpoint_id: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            endpoint_id: endpoint_id.into(),
            credential: credential.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn with_backoff(mut self, base_delay: Duration, max_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self.max_delay = max_delay;
        self
    }

    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    #[must_use]
    pub const fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_heartbeat_interval(mut self, interval: Option<Duration>) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    #[must_use]
    pub const fn with_default_call_timeout(mut self, timeout: Duration) -> Self {
        self.default_call_timeout = timeout;
        self
    }
}
