//! Connection registry: the set of live connections and endpoint selection.

use std::{
    collections::{BTreeSet, HashMap},
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use sandbox_relay_core::{ConnectionId, Message, PendingCalls, RelayError};
use serde::Serialize;
use tokio::{sync::mpsc, time::Instant};

use crate::connection::{ConnectionRecord, ConnectionState, Outbound};

/// Endpoint picked by [`ConnectionRegistry::resolve`].
#[derive(Debug, Clone)]
pub struct ResolvedEndpoint {
    pub connection: ConnectionId,
    pub endpoint_id: String,
    outbound: mpsc::UnboundedSender<Outbound>,
}

impl ResolvedEndpoint {
    /// Queue a message on the endpoint's connection.
    pub fn send(&self, message: Message) -> bool {
        self.outbound.send(Outbound::Frame(message)).is_ok()
    }
}

/// Connection counts for `status()`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryCounts {
    pub connections_total: usize,
    pub authenticated: usize,
    pub endpoints_live: usize,
}

#[derive(Default)]
struct Inner {
    records: HashMap<ConnectionId, ConnectionRecord>,
    next_id: u64,
    next_bind_seq: u64,
}

/// Set of live connection records.
///
/// The registry owns every [`ConnectionRecord`]; other components only
/// hold a [`ConnectionId`]. Removing a record evicts the calls that were
/// sent on it.
pub struct ConnectionRegistry {
    inner: Mutex<Inner>,
    pending: PendingCalls,
}

impl ConnectionRegistry {
    #[must_use]
    pub fn new(pending: PendingCalls) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            pending,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a freshly accepted transport in the `Connecting` state.
    pub fn accept(&self, outbound: mpsc::UnboundedSender<Outbound>) -> ConnectionId {
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = ConnectionId::new(inner.next_id);
        inner.records.insert(id, ConnectionRecord::new(id, outbound));
        id
    }

    /// Mark a connection authenticated. Returns false if it is gone.
    pub fn authenticate(&self, id: ConnectionId, identity: String) -> bool {
        let mut inner = self.lock();
        let Some(record) = inner.records.get_mut(&id) else {
            return false;
        };
        if record.state == ConnectionState::Connecting {
            record.state = ConnectionState::Authenticated;
        }
        record.identity = Some(identity);
        true
    }

    /// Bind an authenticated connection to `endpoint_id`.
    ///
    /// Re-registering rebinds and makes the connection the newest.
    ///
    /// # Errors
    /// `NotAuthenticated` if the connection has not authenticated,
    /// `ConnectionLost` if it is no longer registered.
    pub fn register(&self, id: ConnectionId, endpoint_id: &str) -> Result<(), RelayError> {
        let mut inner = self.lock();
        inner.next_bind_seq += 1;
        let seq = inner.next_bind_seq;
        let record = inner
            .records
            .get_mut(&id)
            .ok_or(RelayError::ConnectionLost)?;
        if !record.is_authenticated() {
            return Err(RelayError::NotAuthenticated);
        }
        record.state = ConnectionState::Bound;
        record.endpoint_id = Some(endpoint_id.to_string());
        record.bound_seq = seq;
        Ok(())
    }

    /// Pick the connection serving `endpoint_id`, or the most recently
    /// registered endpoint when `None`.
    ///
    /// # Errors
    /// `EndpointUnreachable` if the named endpoint has no bound connection,
    /// `NoEndpointsAvailable` if nothing is bound at all.
    pub fn resolve(&self, endpoint_id: Option<&str>) -> Result<ResolvedEndpoint, RelayError> {
        let inner = self.lock();
        let bound = inner.records.values().filter(|r| r.is_bound());
        let newest = match endpoint_id {
            Some(wanted) => bound
                .filter(|r| r.endpoint_id.as_deref() == Some(wanted))
                .max_by_key(|r| r.bound_seq)
                .ok_or_else(|| RelayError::EndpointUnreachable(wanted.to_string()))?,
            None => bound
                .max_by_key(|r| r.bound_seq)
                .ok_or(RelayError::NoEndpointsAvailable)?,
        };
        Ok(ResolvedEndpoint {
            connection: newest.id,
            endpoint_id: newest.endpoint_id.clone().unwrap_or_default(),
            outbound: newest.outbound.clone(),
        })
    }

    /// Drop a connection's authentication and remove it.
    pub fn deauthenticate_and_remove(&self, id: ConnectionId) -> bool {
        if let Some(record) = self.lock().records.get_mut(&id) {
            record.state = ConnectionState::Connecting;
            record.identity = None;
        }
        self.remove(id)
    }

    /// Remove a connection and evict its in-flight calls with
    /// `ConnectionLost`. Returns whether it was present.
    pub fn remove(&self, id: ConnectionId) -> bool {
        let removed = self.lock().records.remove(&id);
        let Some(record) = removed else {
            return false;
        };
        let evicted = self
            .pending
            .evict_all(|target| target == id, &RelayError::ConnectionLost);
        tracing::info!(
            conn = %id,
            endpoint = record.endpoint_id.as_deref().unwrap_or("-"),
            evicted,
            "connection removed"
        );
        true
    }

    /// Tell a connection's driver to close, then remove it.
    pub fn close(&self, id: ConnectionId, reason: &'static str) -> bool {
        if let Some(record) = self.lock().records.get(&id) {
            record.close(reason);
        }
        self.remove(id)
    }

    /// Refresh a connection's liveness timestamp.
    pub fn touch(&self, id: ConnectionId) {
        if let Some(record) = self.lock().records.get_mut(&id) {
            record.last_liveness = Instant::now();
        }
    }

    #[must_use]
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.lock().records.contains_key(&id)
    }

    #[must_use]
    pub fn is_authenticated(&self, id: ConnectionId) -> bool {
        self.lock()
            .records
            .get(&id)
            .is_some_and(ConnectionRecord::is_authenticated)
    }

    #[must_use]
    pub fn state(&self, id: ConnectionId) -> ConnectionState {
        self.lock()
            .records
            .get(&id)
            .map_or(ConnectionState::Closed, |r| r.state)
    }

    /// Endpoint ids with a bound connection, sorted.
    #[must_use]
    pub fn list_endpoints(&self) -> Vec<String> {
        let inner = self.lock();
        inner
            .records
            .values()
            .filter(|r| r.is_bound())
            .filter_map(|r| r.endpoint_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    #[must_use]
    pub fn counts(&self) -> RegistryCounts {
        let inner = self.lock();
        let endpoints: BTreeSet<&str> = inner
            .records
            .values()
            .filter(|r| r.is_bound())
            .filter_map(|r| r.endpoint_id.as_deref())
            .collect();
        RegistryCounts {
            connections_total: inner.records.len(),
            authenticated: inner.records.values().filter(|r| r.is_authenticated()).count(),
            endpoints_live: endpoints.len(),
        }
    }

    /// Ping every live connection and return the ones silent for longer
    /// than `stale_after`. Stale connections are not pinged.
    pub(crate) fn ping_or_collect_stale(
        &self,
        now: Instant,
        stale_after: Duration,
        auth_deadline: Duration,
        ping_id: &str,
    ) -> Vec<ConnectionId> {
        let inner = self.lock();
        let mut stale = Vec::new();
        for record in inner.records.values() {
            let unauthenticated = record.state == ConnectionState::Connecting
                && now.saturating_duration_since(record.accepted_at) > auth_deadline;
            if unauthenticated
                || now.saturating_duration_since(record.last_liveness) > stale_after
            {
                stale.push(record.id);
            } else {
                record.send(Message::Ping {
                    id: Some(ping_id.to_string()),
                });
            }
        }
        stale
    }
}
