//! Heartbeat monitor: pings live connections and evicts silent ones.

use std::{sync::Arc, time::Duration};

use tokio::{
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};

use crate::registry::ConnectionRegistry;

/// Periodic liveness check over the registry.
///
/// This is the only path that reclaims half-open connections whose
/// transport never reported a close.
pub struct HeartbeatMonitor {
    registry: Arc<ConnectionRegistry>,
    interval: Duration,
    stale_after: Duration,
    auth_deadline: Duration,
    ticks: u64,
}

impl HeartbeatMonitor {
    #[must_use]
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        interval: Duration,
        stale_after: Duration,
    ) -> Self {
        Self {
            registry,
            interval,
            stale_after,
            auth_deadline: interval,
            ticks: 0,
        }
    }

    /// Close connections still unauthenticated this long after accept.
    /// Defaults to one interval.
    #[must_use]
    pub const fn with_auth_deadline(mut self, deadline: Duration) -> Self {
        self.auth_deadline = deadline;
        self
    }

    /// Run one pass. Returns the number of evicted connections.
    pub fn tick(&mut self) -> usize {
        self.ticks += 1;
        let ping_id = format!("hb-{}", self.ticks);
        let stale = self.registry.ping_or_collect_stale(
            Instant::now(),
            self.stale_after,
            self.auth_deadline,
            &ping_id,
        );

        for conn in &stale {
            tracing::info!(
                %conn,
                stale_after = ?self.stale_after,
                auth_deadline = ?self.auth_deadline,
                "evicting silent or unauthenticated connection"
            );
            self.registry.close(*conn, "heartbeat timeout");
        }
        stale.len()
    }

    /// Run on a fixed interval until the task is aborted.
    #[must_use]
    pub fn spawn(mut self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.tick();
            }
        })
    }
}

/// Aborts a spawned heartbeat task when dropped.
#[derive(Debug)]
pub struct HeartbeatGuard(JoinHandle<()>);

impl HeartbeatGuard {
    #[must_use]
    pub const fn new(handle: JoinHandle<()>) -> Self {
        Self(handle)
    }
}

impl Drop for HeartbeatGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

#[cfg(test)]
mod tests {
    use sandbox_relay_core::{Message, PendingCalls, RelayError};
    use tokio::sync::mpsc;

    use super::*;
    use crate::connection::Outbound;

    #[tokio::test(start_paused = true)]
    async fn test_pings_fresh_and_evicts_stale() {
        let pending = PendingCalls::default();
        let registry = Arc::new(ConnectionRegistry::new(pending.clone()));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn = registry.accept(tx);
        registry.authenticate(conn, "test".into());
        registry.register(conn, "ws-a").unwrap();
        let call = pending.create(conn, Duration::from_secs(600)).unwrap();

        let interval = Duration::from_secs(30);
        let mut monitor = HeartbeatMonitor::new(Arc::clone(&registry), interval, interval * 2);

        tokio::time::advance(interval).await;
        assert_eq!(monitor.tick(), 0);
        assert!(matches!(
            rx.try_recv(),
            Ok(Outbound::Frame(Message::Ping { id: Some(_) }))
        ));

        tokio::time::advance(interval).await;
        assert_eq!(monitor.tick(), 0);

        tokio::time::advance(interval).await;
        assert_eq!(monitor.tick(), 1);
        assert!(!registry.contains(conn));
        assert_eq!(call.wait().await, Err(RelayError::ConnectionLost));
    }

    #[tokio::test(start_paused = true)]
    async fn test_touch_keeps_connection_alive() {
        let registry = Arc::new(ConnectionRegistry::new(PendingCalls::default()));
        let (tx, _rx) = mpsc::unbounded_channel();
        let conn = registry.accept(tx);
        registry.authenticate(conn, "test".into());

        let interval = Duration::from_secs(30);
        let mut monitor = HeartbeatMonitor::new(Arc::clone(&registry), interval, interval * 2);
        for _ in 0..5 {
            tokio::time::advance(interval).await;
            registry.touch(conn);
            assert_eq!(monitor.tick(), 0);
        }
        assert!(registry.contains(conn));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unauthenticated_connection_is_closed_after_deadline() {
        let registry = Arc::new(ConnectionRegistry::new(PendingCalls::default()));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn = registry.accept(tx);

        let interval = Duration::from_secs(30);
        let mut monitor = HeartbeatMonitor::new(Arc::clone(&registry), interval, interval * 2)
            .with_auth_deadline(Duration::from_secs(10));

        // Answering pings does not count as authenticating.
        tokio::time::advance(Duration::from_secs(5)).await;
        registry.touch(conn);
        assert_eq!(monitor.tick(), 0);
        assert!(registry.contains(conn));

        tokio::time::advance(Duration::from_secs(10)).await;
        registry.touch(conn);
        assert_eq!(monitor.tick(), 1);
        assert!(!registry.contains(conn));

        let mut closed = false;
        while let Ok(outbound) = rx.try_recv() {
            closed |= matches!(outbound, Outbound::Close { .. });
        }
        assert!(closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_guard_aborts_heartbeat_on_drop() {
        let registry = Arc::new(ConnectionRegistry::new(PendingCalls::default()));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn = registry.accept(tx);
        registry.authenticate(conn, "test".into());

        let interval = Duration::from_secs(30);
        let guard = HeartbeatGuard::new(
            HeartbeatMonitor::new(Arc::clone(&registry), interval, interval * 2).spawn(),
        );
        drop(guard);

        tokio::time::sleep(interval * 5).await;
        assert!(rx.try_recv().is_err());
        assert!(registry.contains(conn));
    }
}
