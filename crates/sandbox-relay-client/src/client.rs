//! Reconnecting client: keeps one endpoint bound to the relay.

use std::{
    future::Future,
    sync::{
        Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU32, AtomicU64, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use futures::{
    Sink, SinkExt, Stream, StreamExt,
    future::BoxFuture,
    stream::FuturesUnordered,
};
use sandbox_relay_core::{
    ActionTable, ConnectionId, FrameTransport, Message, PendingCalls, RelayError, TransportError,
};
use serde::Serialize;
use serde_json::Value;
use tokio::{
    sync::{mpsc, watch},
    time::{Instant, Interval, MissedTickBehavior},
};

use crate::{Backoff, ClientConfig};

/// Opens transports to the relay.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Transport: FrameTransport;

    /// Open a fresh transport.
    async fn connect(&self) -> Result<Self::Transport, TransportError>;
}

/// Adapter turning an async closure into a [`Connector`].
pub struct FnConnector<F>(pub F);

#[async_trait]
impl<F, Fut, T> Connector for FnConnector<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, TransportError>> + Send + 'static,
    T: FrameTransport,
{
    type Transport = T;

    async fn connect(&self) -> Result<T, TransportError> {
        (self.0)().await
    }
}

/// Lifecycle of a [`ReconnectingClient`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClientState {
    Disconnected,
    Connecting,
    Authenticating,
    #[serde(rename_all = "camelCase")]
    Bound { endpoint_id: String },
    /// Terminal: reconnect attempts exhausted.
    GiveUp { attempts: u32 },
}

/// Snapshot returned by [`ReconnectingClient::status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientStatus {
    pub state: ClientState,
    /// Consecutive failed attempts since the last bind.
    pub attempts: u32,
    pub pending_calls: usize,
}

struct Session {
    conn: ConnectionId,
    outbound: mpsc::UnboundedSender<Message>,
}

enum Attempt {
    Shutdown,
    Ended(&'static str),
    Failed(RelayError),
}

/// Remote-endpoint side of the relay.
///
/// [`run`](Self::run) connects, authenticates, registers the endpoint and
/// then serves calls from the relay until the transport drops, reconnecting
/// with exponential backoff. Share it behind an `Arc` to call into the
/// relay while `run` is in progress.
pub struct ReconnectingClient<C> {
    config: ClientConfig,
    connector: C,
    actions: ActionTable,
    pending: PendingCalls,
    state: watch::Sender<ClientState>,
    shutdown: watch::Sender<bool>,
    session: Mutex<Option<Session>>,
    attempts: AtomicU32,
    sessions: AtomicU64,
}

impl<C: Connector> ReconnectingClient<C> {
    #[must_use]
    pub fn new(config: ClientConfig, connector: C, actions: ActionTable) -> Self {
        Self {
            config,
            connector,
            actions,
            pending: PendingCalls::default(),
            state: watch::Sender::new(ClientState::Disconnected),
            shutdown: watch::Sender::new(false),
            session: Mutex::new(None),
            attempts: AtomicU32::new(0),
            sessions: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    #[must_use]
    pub fn state(&self) -> ClientState {
        self.state.borrow().clone()
    }

    /// Watch state transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ClientState> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn status(&self) -> ClientStatus {
        ClientStatus {
            state: self.state(),
            attempts: self.attempts.load(Ordering::Relaxed),
            pending_calls: self.pending.len(),
        }
    }

    /// Stop [`run`](Self::run) at its next suspension point.
    ///
    /// Shutdown is sticky: a later `run` returns immediately.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Invoke `action` on the relay.
    ///
    /// # Errors
    /// `NotConnected` unless the client is bound; otherwise the call's
    /// settlement, including `Timeout` and `ConnectionLost`.
    pub async fn call(
        &self,
        action: &str,
        params: Value,
        timeout: Option<Duration>,
    ) -> Result<Value, RelayError> {
        let (conn, outbound) = {
            let session = self.lock_session();
            let Some(session) = session.as_ref() else {
                return Err(RelayError::NotConnected);
            };
            (session.conn, session.outbound.clone())
        };

        let timeout = timeout.unwrap_or(self.config.default_call_timeout);
        let call = self.pending.create(conn, timeout)?;
        let id = call.id().to_string();
        let sent = outbound
            .send(Message::Call {
                id: id.clone(),
                action: action.to_string(),
                params,
            })
            .is_ok();
        // The session may have ended between the lookup and create.
        if !sent || self.current_session() != Some(conn) {
            self.pending.settle(&id, Err(RelayError::ConnectionLost));
        }

        call.wait().await
    }

    /// Drive the connection state machine.
    ///
    /// # Errors
    /// Returns `GiveUp` once `max_attempts` consecutive attempts have
    /// failed. Returns `Ok` after [`shutdown`](Self::shutdown).
    pub async fn run(&self) -> Result<(), RelayError> {
        let mut shutdown = self.shutdown.subscribe();
        let mut backoff = Backoff::new(
            self.config.base_delay,
            self.config.max_delay,
            self.config.max_attempts,
        );

        loop {
            let delay = match self.attempt(&mut shutdown, &mut backoff).await {
                Attempt::Shutdown => break,
                Attempt::Ended(reason) => {
                    tracing::info!(reason, "relay session ended");
                    backoff.current_delay()
                }
                Attempt::Failed(e) => {
                    let Some(delay) = backoff.record_failure() else {
                        let attempts = backoff.failures();
                        self.attempts.store(attempts, Ordering::Relaxed);
                        tracing::error!(attempts, "giving up on relay: {e}");
                        self.set_state(ClientState::GiveUp { attempts });
                        return Err(RelayError::GiveUp { attempts });
                    };
                    tracing::warn!(
                        attempt = backoff.failures(),
                        ?delay,
                        "connection attempt failed: {e}"
                    );
                    delay
                }
            };

            self.attempts.store(backoff.failures(), Ordering::Relaxed);
            self.set_state(ClientState::Disconnected);
            tokio::select! {
                () = stopped(&mut shutdown) => break,
                () = tokio::time::sleep(delay) => {}
            }
        }

        self.set_state(ClientState::Disconnected);
        Ok(())
    }

    async fn attempt(&self, shutdown: &mut watch::Receiver<bool>, backoff: &mut Backoff) -> Attempt {
        self.set_state(ClientState::Connecting);
        let transport = tokio::select! {
            () = stopped(shutdown) => return Attempt::Shutdown,
            connected = self.connector.connect() => match connected {
                Ok(transport) => transport,
                Err(e) => return Attempt::Failed(e.into()),
            },
        };

        let conn = ConnectionId::new(self.sessions.fetch_add(1, Ordering::Relaxed) + 1);
        let (mut sink, mut stream) = transport.split::<String>();

        self.set_state(ClientState::Authenticating);
        let handshake = tokio::time::timeout(
            self.config.handshake_timeout,
            self.handshake(conn, &mut sink, &mut stream),
        );
        let outcome = tokio::select! {
            () = stopped(shutdown) => None,
            result = handshake => Some(result),
        };
        let failure = match outcome {
            None => {
                let _ = sink.close().await;
                return Attempt::Shutdown;
            }
            Some(Ok(Ok(()))) => None,
            Some(Ok(Err(e))) => Some(e),
            Some(Err(_)) => Some(RelayError::Timeout(self.config.handshake_timeout)),
        };
        if let Some(e) = failure {
            let _ = sink.close().await;
            return Attempt::Failed(e);
        }

        backoff.reset();
        self.attempts.store(0, Ordering::Relaxed);
        self.drive(conn, sink, stream, shutdown).await
    }

    async fn handshake<Si, St>(
        &self,
        conn: ConnectionId,
        sink: &mut Si,
        stream: &mut St,
    ) -> Result<(), RelayError>
    where
        Si: Sink<String, Error = TransportError> + Unpin + Send,
        St: Stream<Item = Result<String, TransportError>> + Unpin + Send,
    {
        let auth_id = format!("auth-{}", conn.get());
        send(
            sink,
            Message::Auth {
                id: auth_id.clone(),
                credential: self.config.credential.clone(),
            },
        )
        .await?;
        let ack = await_response(sink, stream, &auth_id).await?;
        tracing::info!(
            %conn,
            identity = ack["identity"].as_str().unwrap_or("-"),
            "authenticated with relay"
        );

        let register_id = format!("register-{}", conn.get());
        send(
            sink,
            Message::RegisterEndpoint {
                id: register_id.clone(),
                endpoint_id: self.config.endpoint_id.clone(),
            },
        )
        .await?;
        await_response(sink, stream, &register_id).await?;
        Ok(())
    }

    async fn drive<Si, St>(
        &self,
        conn: ConnectionId,
        mut sink: Si,
        mut stream: St,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Attempt
    where
        Si: Sink<String, Error = TransportError> + Unpin + Send,
        St: Stream<Item = Result<String, TransportError>> + Unpin + Send,
    {
        let (tx, mut rx) = mpsc::unbounded_channel();
        *self.lock_session() = Some(Session { conn, outbound: tx });
        self.set_state(ClientState::Bound {
            endpoint_id: self.config.endpoint_id.clone(),
        });

        let mut running: FuturesUnordered<BoxFuture<'static, Message>> = FuturesUnordered::new();
        let mut heartbeat = self.config.heartbeat_interval.map(|period| {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            (ticker, period * 2)
        });
        let mut last_seen = Instant::now();
        let mut pings = 0u64;

        let end = loop {
            tokio::select! {
                () = stopped(shutdown) => break Attempt::Shutdown,
                frame = stream.next() => match frame {
                    Some(Ok(raw)) => {
                        last_seen = Instant::now();
                        if let Some(reply) = self.on_frame(conn, &raw, &mut running) {
                            if send(&mut sink, reply).await.is_err() {
                                break Attempt::Ended("send failed");
                            }
                        }
                    }
                    Some(Err(e)) => {
                        tracing::warn!(%conn, "transport error: {e}");
                        break Attempt::Ended("transport error");
                    }
                    None => break Attempt::Ended("closed by relay"),
                },
                Some(message) = rx.recv() => {
                    if send(&mut sink, message).await.is_err() {
                        break Attempt::Ended("send failed");
                    }
                }
                Some(response) = running.next(), if !running.is_empty() => {
                    if send(&mut sink, response).await.is_err() {
                        break Attempt::Ended("send failed");
                    }
                }
                stale_after = heartbeat_tick(&mut heartbeat) => {
                    if last_seen.elapsed() > stale_after {
                        tracing::warn!(%conn, ?stale_after, "relay went silent, dropping connection");
                        break Attempt::Ended("heartbeat timeout");
                    }
                    pings += 1;
                    let ping = Message::Ping { id: Some(format!("hb-{pings}")) };
                    if send(&mut sink, ping).await.is_err() {
                        break Attempt::Ended("send failed");
                    }
                }
            }
        };

        self.clear_session(conn);
        let evicted = self
            .pending
            .evict_all(|target| target == conn, &RelayError::ConnectionLost);
        let _ = sink.close().await;
        tracing::info!(%conn, evicted, abandoned = running.len(), "relay session closed");
        end
    }

    fn on_frame(
        &self,
        conn: ConnectionId,
        raw: &str,
        running: &mut FuturesUnordered<BoxFuture<'static, Message>>,
    ) -> Option<Message> {
        let message = match Message::decode(raw) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(%conn, "dropping envelope: {e}");
                return None;
            }
        };
        tracing::debug!(%conn, kind = ?message.kind(), id = message.id(), "inbound envelope");

        match message {
            Message::Call { id, action, params } => {
                running.push(self.actions.invoke(id, action, params));
                None
            }
            Message::Response { id, outcome } => {
                self.pending.settle_from(conn, &id, outcome);
                None
            }
            Message::Ping { id } => Some(Message::Pong { id }),
            Message::Pong { .. } => None,
            Message::Error { id, message } => {
                tracing::warn!(%conn, id = id.as_deref(), "relay reported error: {message}");
                if let Some(id) = id {
                    self.pending
                        .settle_from(conn, &id, Err(RelayError::from_wire(&message)));
                }
                None
            }
            Message::Auth { id, .. } | Message::RegisterEndpoint { id, .. } => {
                tracing::warn!(%conn, %id, "ignoring handshake envelope from relay");
                None
            }
        }
    }

    fn set_state(&self, next: ClientState) {
        let previous = self.state.send_replace(next.clone());
        if previous != next {
            tracing::info!(from = ?previous, to = ?next, "client state changed");
        }
    }

    fn lock_session(&self) -> MutexGuard<'_, Option<Session>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn current_session(&self) -> Option<ConnectionId> {
        self.lock_session().as_ref().map(|session| session.conn)
    }

    fn clear_session(&self, conn: ConnectionId) {
        let mut session = self.lock_session();
        if session.as_ref().is_some_and(|s| s.conn == conn) {
            *session = None;
        }
    }
}

/// Resolves once shutdown has been requested.
async fn stopped(rx: &mut watch::Receiver<bool>) {
    loop {
        let stop = *rx.borrow_and_update();
        if stop {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

async fn heartbeat_tick(heartbeat: &mut Option<(Interval, Duration)>) -> Duration {
    match heartbeat {
        Some((ticker, stale_after)) => {
            ticker.tick().await;
            *stale_after
        }
        None => std::future::pending().await,
    }
}

async fn send<S>(sink: &mut S, message: Message) -> Result<(), RelayError>
where
    S: Sink<String, Error = TransportError> + Unpin,
{
    let raw = message.encode()?;
    tracing::debug!(kind = ?message.kind(), id = message.id(), "outbound envelope");
    sink.send(raw).await.map_err(RelayError::from)
}

/// Read until the response to `id` arrives, answering pings meanwhile.
async fn await_response<Si, St>(sink: &mut Si, stream: &mut St, id: &str) -> Result<Value, RelayError>
where
    Si: Sink<String, Error = TransportError> + Unpin,
    St: Stream<Item = Result<String, TransportError>> + Unpin,
{
    while let Some(frame) = stream.next().await {
        match Message::decode(&frame?) {
            Ok(Message::Response { id: got, outcome }) if got == id => return outcome,
            Ok(Message::Error { id: Some(got), message }) if got == id => {
                return Err(RelayError::from_wire(&message));
            }
            Ok(Message::Ping { id }) => send(sink, Message::Pong { id }).await?,
            Ok(other) => tracing::debug!(kind = ?other.kind(), "ignoring envelope during handshake"),
            Err(e) => tracing::warn!("dropping envelope during handshake: {e}"),
        }
    }
    Err(RelayError::ConnectionLost)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use sandbox_relay_core::{ActionError, MemoryTransport};
    use serde_json::json;
    use tokio_test::assert_err;

    use super::*;

    struct MemoryConnector {
        peers: mpsc::UnboundedSender<MemoryTransport>,
    }

    #[async_trait]
    impl Connector for MemoryConnector {
        type Transport = MemoryTransport;

        async fn connect(&self) -> Result<MemoryTransport, TransportError> {
            let (local, remote) = MemoryTransport::pair();
            self.peers.send(remote).map_err(|_| TransportError::Closed)?;
            Ok(local)
        }
    }

    fn config() -> ClientConfig {
        ClientConfig::new("memory://relay", "ws-a", "tok-1")
            .with_backoff(Duration::from_millis(10), Duration::from_millis(100))
            .with_heartbeat_interval(None)
    }

    fn client(
        config: ClientConfig,
    ) -> (
        Arc<ReconnectingClient<MemoryConnector>>,
        mpsc::UnboundedReceiver<MemoryTransport>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let actions = ActionTable::new()
            .with_fn("echo", |params| async move { Ok::<_, ActionError>(params) });
        let client = ReconnectingClient::new(config, MemoryConnector { peers: tx }, actions);
        (Arc::new(client), rx)
    }

    fn spawn_run<C: Connector>(
        client: &Arc<ReconnectingClient<C>>,
    ) -> tokio::task::JoinHandle<Result<(), RelayError>> {
        let client = Arc::clone(client);
        tokio::spawn(async move { client.run().await })
    }

    async fn recv(peer: &mut MemoryTransport) -> Message {
        let raw = peer.next().await.unwrap().unwrap();
        Message::decode(&raw).unwrap()
    }

    async fn reply(peer: &mut MemoryTransport, message: Message) {
        peer.send(message.encode().unwrap()).await.unwrap();
    }

    /// Play the relay side of the handshake.
    async fn accept(peer: &mut MemoryTransport) {
        let Message::Auth { id, credential } = recv(peer).await else {
            panic!("expected auth");
        };
        assert_eq!(credential, "tok-1");
        reply(peer, Message::auth_ack(id, "shared-secret")).await;

        let Message::RegisterEndpoint { id, endpoint_id } = recv(peer).await else {
            panic!("expected register-endpoint");
        };
        assert_eq!(endpoint_id, "ws-a");
        reply(peer, Message::register_ack(id, &endpoint_id)).await;
    }

    async fn wait_bound<C: Connector>(client: &ReconnectingClient<C>) {
        client
            .subscribe()
            .wait_for(|state| matches!(state, ClientState::Bound { .. }))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_handshake_then_serve_calls() {
        let (client, mut peers) = client(config());
        let _run = spawn_run(&client);

        let mut peer = peers.recv().await.unwrap();
        accept(&mut peer).await;
        wait_bound(&client).await;
        assert_eq!(
            client.state(),
            ClientState::Bound {
                endpoint_id: "ws-a".into()
            }
        );

        let call = Message::Call {
            id: "7-abc".into(),
            action: "echo".into(),
            params: json!({"x": 1}),
        };
        reply(&mut peer, call).await;
        assert_eq!(recv(&mut peer).await, Message::ok("7-abc".into(), json!({"x": 1})));

        reply(&mut peer, Message::Ping { id: Some("hb-1".into()) }).await;
        assert_eq!(recv(&mut peer).await, Message::Pong { id: Some("hb-1".into()) });
    }

    #[tokio::test]
    async fn test_call_before_bound_is_rejected() {
        let (client, _peers) = client(config());
        let err = assert_err!(client.call("relay.listEndpoints", json!({}), None).await);
        assert_eq!(err, RelayError::NotConnected);
        assert_eq!(client.status().pending_calls, 0);
    }

    #[tokio::test]
    async fn test_call_relay_and_evict_on_close() {
        let (client, mut peers) = client(config());
        let _run = spawn_run(&client);
        let mut peer = peers.recv().await.unwrap();
        accept(&mut peer).await;
        wait_bound(&client).await;

        let caller = tokio::spawn({
            let client = Arc::clone(&client);
            async move { client.call("relay.listEndpoints", Value::Null, None).await }
        });
        let Message::Call { id, action, .. } = recv(&mut peer).await else {
            panic!("expected call");
        };
        assert_eq!(action, "relay.listEndpoints");
        reply(&mut peer, Message::ok(id, json!(["ws-a"]))).await;
        assert_eq!(caller.await.unwrap(), Ok(json!(["ws-a"])));

        let caller = tokio::spawn({
            let client = Arc::clone(&client);
            async move { client.call("slow", Value::Null, None).await }
        });
        let _call = recv(&mut peer).await;
        drop(peer);
        assert_eq!(caller.await.unwrap(), Err(RelayError::ConnectionLost));
        assert_eq!(client.status().pending_calls, 0);

        // Reconnects after the session drops.
        let mut peer = peers.recv().await.unwrap();
        accept(&mut peer).await;
        wait_bound(&client).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let config = config().with_max_attempts(3);
        let connector = FnConnector(|| async {
            Err::<MemoryTransport, _>(TransportError::Io("connection refused".into()))
        });
        let client = ReconnectingClient::new(config, connector, ActionTable::new());

        let started = Instant::now();
        let err = assert_err!(client.run().await);
        assert_eq!(err, RelayError::GiveUp { attempts: 3 });
        // Two waits between three attempts: 10ms then 20ms.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(30), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(40), "{elapsed:?}");

        let status = client.status();
        assert_eq!(status.state, ClientState::GiveUp { attempts: 3 });
        assert_eq!(status.attempts, 3);
    }

    #[tokio::test]
    async fn test_rejected_credential_is_retried() {
        let (client, mut peers) = client(config());
        let _run = spawn_run(&client);

        let mut peer = peers.recv().await.unwrap();
        let Message::Auth { id, .. } = recv(&mut peer).await else {
            panic!("expected auth");
        };
        reply(&mut peer, Message::err(id, RelayError::NotAuthenticated)).await;
        drop(peer);

        let mut peer = peers.recv().await.unwrap();
        accept(&mut peer).await;
        wait_bound(&client).await;
        assert_eq!(client.status().attempts, 0);
    }

    #[tokio::test]
    async fn test_shutdown_stops_run() {
        let (client, mut peers) = client(config());
        let run = spawn_run(&client);
        let mut peer = peers.recv().await.unwrap();
        accept(&mut peer).await;
        wait_bound(&client).await;

        client.shutdown();
        assert_eq!(run.await.unwrap(), Ok(()));
        assert_eq!(client.state(), ClientState::Disconnected);
        assert!(peer.next().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts_backoff() {
        let config = config().with_backoff(Duration::from_secs(60), Duration::from_secs(60));
        let (tx, mut attempts) = mpsc::unbounded_channel();
        let connector = FnConnector(move || {
            let tx = tx.clone();
            async move {
                let _ = tx.send(());
                Err::<MemoryTransport, _>(TransportError::Io("connection refused".into()))
            }
        });
        let client = Arc::new(ReconnectingClient::new(config, connector, ActionTable::new()));
        let started = Instant::now();
        let run = spawn_run(&client);

        attempts.recv().await.unwrap();
        client
            .subscribe()
            .wait_for(|state| *state == ClientState::Disconnected)
            .await
            .unwrap();
        client.shutdown();

        assert_eq!(run.await.unwrap(), Ok(()));
        assert!(started.elapsed() < Duration::from_secs(60));
        assert!(attempts.try_recv().is_err());
        assert_eq!(client.status().attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_relay_is_dropped() {
        let config = config().with_heartbeat_interval(Some(Duration::from_secs(1)));
        let (client, mut peers) = client(config);
        let _run = spawn_run(&client);

        let mut first = peers.recv().await.unwrap();
        accept(&mut first).await;
        wait_bound(&client).await;

        // Never answer the pings: the client reconnects on its own.
        let mut second = peers.recv().await.unwrap();
        accept(&mut second).await;
        wait_bound(&client).await;

        let mut pings = 0;
        while let Some(Ok(raw)) = first.next().await {
            if matches!(Message::decode(&raw), Ok(Message::Ping { .. })) {
                pings += 1;
            }
        }
        assert!((1..=2).contains(&pings), "{pings} pings");
    }

    #[test]
    fn test_status_serializes_camel_case() {
        let status = ClientStatus {
            state: ClientState::Bound {
                endpoint_id: "ws-a".into(),
            },
            attempts: 0,
            pending_calls: 2,
        };
        assert_eq!(
            serde_json::to_value(&status).unwrap(),
            json!({
                "state": {"kind": "bound", "endpointId": "ws-a"},
                "attempts": 0,
                "pendingCalls": 2
            })
        );
    }
}
