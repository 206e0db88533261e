//! Pending-call table: correlation of outbound calls with their responses.

use std::{
    collections::HashMap,
    fmt,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError, Weak,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use serde_json::Value;
use tokio::{sync::oneshot, task::AbortHandle};
use uuid::Uuid;

use crate::RelayError;

/// Settlement value of a call.
pub type CallOutcome = Result<Value, RelayError>;

/// Identity of one physical connection (or one client session).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

struct Entry {
    target: ConnectionId,
    tx: oneshot::Sender<CallOutcome>,
    timer: AbortHandle,
}

type Calls = Mutex<HashMap<String, Entry>>;

/// Table of in-flight calls.
///
/// Every entry is settled exactly once: by a response, by its deadline, or
/// by eviction of the connection it was sent on. All mutations happen under
/// one mutex; the completion value is delivered after the lock is released.
#[derive(Clone)]
pub struct PendingCalls {
    calls: Arc<Calls>,
    counter: Arc<AtomicU64>,
    suffix: Arc<str>,
    limit: Option<usize>,
}

impl Default for PendingCalls {
    fn default() -> Self {
        Self::new(None)
    }
}

impl PendingCalls {
    /// Create a table, optionally capping the number of in-flight calls.
    #[must_use]
    pub fn new(limit: Option<usize>) -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        Self {
            calls: Arc::new(Mutex::new(HashMap::new())),
            counter: Arc::new(AtomicU64::new(1)),
            suffix: suffix[..8].into(),
            limit,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a call sent on `target` and arm its deadline.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    /// Returns `TooManyPendingCalls` when the table is at its limit.
    pub fn create(
        &self,
        target: ConnectionId,
        timeout: Duration,
    ) -> Result<PendingCall, RelayError> {
        let mut calls = self.lock();
        if let Some(limit) = self.limit {
            if calls.len() >= limit {
                return Err(RelayError::TooManyPendingCalls { limit });
            }
        }

        let seq = self.counter.fetch_add(1, Ordering::Relaxed);
        let id = format!("{seq}-{}", self.suffix);
        let (tx, rx) = oneshot::channel();

        let weak = Arc::downgrade(&self.calls);
        let timer_id = id.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            expire(&weak, &timer_id, timeout);
        })
        .abort_handle();

        calls.insert(id.clone(), Entry { target, tx, timer });
        drop(calls);

        tracing::trace!(call_id = %id, %target, ?timeout, "pending call created");
        Ok(PendingCall { id, rx })
    }

    /// Settle a call. A missing id is a silent no-op.
    ///
    /// Returns whether this call performed the settlement.
    pub fn settle(&self, id: &str, outcome: CallOutcome) -> bool {
        let entry = self.lock().remove(id);
        entry.is_some_and(|entry| {
            deliver(entry, outcome);
            true
        })
    }

    /// Settle a call only if it was sent on `from`.
    ///
    /// A response arriving on another connection, or after the call was
    /// already settled, is dropped.
    pub fn settle_from(&self, from: ConnectionId, id: &str, outcome: CallOutcome) -> bool {
        let entry = {
            let mut calls = self.lock();
            match calls.get(id) {
                Some(entry) if entry.target == from => calls.remove(id),
                Some(entry) => {
                    tracing::warn!(
                        call_id = id,
                        %from,
                        target = %entry.target,
                        "response arrived on a connection the call was not sent on"
                    );
                    None
                }
                None => {
                    tracing::debug!(call_id = id, %from, "dropping late response for settled call");
                    None
                }
            }
        };
        entry.is_some_and(|entry| {
            deliver(entry, outcome);
            true
        })
    }

    /// Settle every call whose target matches `predicate` with `reason`.
    ///
    /// Returns the number of calls evicted.
    pub fn evict_all(&self, predicate: impl Fn(ConnectionId) -> bool, reason: &RelayError) -> usize {
        let evicted: Vec<Entry> = {
            let mut calls = self.lock();
            let ids: Vec<String> = calls
                .iter()
                .filter(|(_, entry)| predicate(entry.target))
                .map(|(id, _)| id.clone())
                .collect();
            ids.iter().filter_map(|id| calls.remove(id)).collect()
        };

        let count = evicted.len();
        for entry in evicted {
            deliver(entry, Err(reason.clone()));
        }
        if count > 0 {
            tracing::debug!(count, %reason, "evicted pending calls");
        }
        count
    }

    /// Number of in-flight calls.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }
}

fn deliver(entry: Entry, outcome: CallOutcome) {
    entry.timer.abort();
    // The caller may have stopped waiting.
    let _ = entry.tx.send(outcome);
}

fn expire(calls: &Weak<Calls>, id: &str, timeout: Duration) {
    let Some(calls) = calls.upgrade() else {
        return;
    };
    let entry = calls
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .remove(id);
    if let Some(entry) = entry {
        tracing::debug!(call_id = id, ?timeout, "pending call timed out");
        let _ = entry.tx.send(Err(RelayError::Timeout(timeout)));
    }
}

/// Completion handle for one call.
#[derive(Debug)]
pub struct PendingCall {
    id: String,
    rx: oneshot::Receiver<CallOutcome>,
}

impl PendingCall {
    /// Call id to put on the wire.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Wait for the settlement.
    ///
    /// # Errors
    /// Returns the error the call was settled with. A table dropped with the
    /// call still in flight reads as `ConnectionLost`.
    pub async fn wait(self) -> CallOutcome {
        self.rx.await.unwrap_or(Err(RelayError::ConnectionLost))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio::time::Instant;
    use tokio_test::{assert_err, assert_ok};

    use super::*;

    const A: ConnectionId = ConnectionId::new(1);
    const B: ConnectionId = ConnectionId::new(2);

    #[tokio::test(start_paused = true)]
    async fn test_response_settles_once() {
        let table = PendingCalls::default();
        let call = table.create(A, Duration::from_secs(5)).unwrap();
        let id = call.id().to_string();

        assert!(table.settle_from(A, &id, Ok(json!({"x": 1}))));
        assert!(!table.settle_from(A, &id, Ok(json!(null))));
        assert!(!table.settle(&id, Err(RelayError::ConnectionLost)));

        let value = assert_ok!(call.wait().await);
        assert_eq!(value, json!({"x": 1}));
        assert!(table.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_settles_and_removes() {
        let table = PendingCalls::default();
        let started = Instant::now();
        let call = table.create(A, Duration::from_millis(250)).unwrap();
        let id = call.id().to_string();

        let err = assert_err!(call.wait().await);
        assert_eq!(err, RelayError::Timeout(Duration::from_millis(250)));
        assert!(started.elapsed() >= Duration::from_millis(250));
        assert!(started.elapsed() < Duration::from_millis(300));
        assert!(!table.contains(&id));

        // A late response is a no-op.
        assert!(!table.settle_from(A, &id, Ok(json!(1))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_response_from_wrong_connection_is_ignored() {
        let table = PendingCalls::default();
        let call = table.create(A, Duration::from_secs(1)).unwrap();
        let id = call.id().to_string();

        assert!(!table.settle_from(B, &id, Ok(json!("spoofed"))));
        assert!(table.contains(&id));
        assert!(table.settle_from(A, &id, Ok(json!("real"))));
        assert_eq!(call.wait().await.unwrap(), json!("real"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_evict_all_only_touches_matching_target() {
        let table = PendingCalls::default();
        let a1 = table.create(A, Duration::from_secs(5)).unwrap();
        let a2 = table.create(A, Duration::from_secs(5)).unwrap();
        let b1 = table.create(B, Duration::from_secs(5)).unwrap();

        let evicted = table.evict_all(|target| target == A, &RelayError::ConnectionLost);
        assert_eq!(evicted, 2);
        assert_eq!(table.len(), 1);
        assert!(table.contains(b1.id()));

        assert_eq!(a1.wait().await, Err(RelayError::ConnectionLost));
        assert_eq!(a2.wait().await, Err(RelayError::ConnectionLost));
    }

    #[tokio::test(start_paused = true)]
    async fn test_settled_call_does_not_time_out_later() {
        let table = PendingCalls::default();
        let call = table.create(A, Duration::from_millis(100)).unwrap();
        let id = call.id().to_string();
        assert!(table.settle(&id, Ok(json!(true))));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(call.wait().await, Ok(json!(true)));
    }

    #[tokio::test]
    async fn test_limit_rejects_new_calls() {
        let table = PendingCalls::new(Some(2));
        let _a = table.create(A, Duration::from_secs(5)).unwrap();
        let _b = table.create(A, Duration::from_secs(5)).unwrap();
        let err = table.create(A, Duration::from_secs(5)).unwrap_err();
        assert_eq!(err, RelayError::TooManyPendingCalls { limit: 2 });
    }

    #[tokio::test]
    async fn test_ids_are_unique() {
        let table = PendingCalls::default();
        let other = PendingCalls::default();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..100 {
            assert!(seen.insert(table.create(A, Duration::from_secs(5)).unwrap().id().to_string()));
            assert!(seen.insert(other.create(A, Duration::from_secs(5)).unwrap().id().to_string()));
        }
    }
}
