//! `sandbox-relay`: run the relay, or connect a workspace to one.
//!
//! Run with: `sandbox-relay serve --secret tok-1`
//! and in the workspace: `sandbox-relay connect --endpoint-id ws-a --token tok-1`

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use sandbox_relay_client::{ClientConfig, ReconnectingClient, WebSocketConnector};
use sandbox_relay_core::{ActionError, ActionTable};
use sandbox_relay_server::{Relay, RelayConfig, websocket};
use serde_json::json;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about = "Bidirectional call relay between an agent and its workspaces")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the relay (websocket endpoint plus HTTP call API).
    Serve(ServeArgs),
    /// Connect this workspace to a relay as a remote endpoint.
    Connect(ConnectArgs),
}

#[derive(Args, Debug)]
struct ServeArgs {
    #[arg(long, env = "RELAY_LISTEN", default_value = "127.0.0.1:8787")]
    listen: SocketAddr,
    /// Shared secret endpoints must present. Unset accepts any credential.
    #[arg(long, env = "RELAY_SECRET", hide_env_values = true)]
    secret: Option<String>,
    #[arg(long, env = "RELAY_HEARTBEAT_SECS", default_value_t = 30)]
    heartbeat_secs: u64,
    #[arg(long, env = "RELAY_CALL_TIMEOUT_MS", default_value_t = 30_000)]
    call_timeout_ms: u64,
    /// Cap on in-flight calls. 0 disables the cap.
    #[arg(long, env = "RELAY_MAX_PENDING", default_value_t = 1024)]
    max_pending: usize,
}

impl ServeArgs {
    fn relay_config(&self) -> RelayConfig {
        let mut config = RelayConfig::new()
            .with_listen(self.listen)
            .with_heartbeat_interval(Duration::from_secs(self.heartbeat_secs.max(1)))
            .with_default_call_timeout(Duration::from_millis(self.call_timeout_ms))
            .with_max_pending_calls((self.max_pending > 0).then_some(self.max_pending));
        if let Some(secret) = &self.secret {
            config = config.with_shared_secret(secret.clone());
        }
        config
    }
}

#[derive(Args, Debug)]
struct ConnectArgs {
    #[arg(long, env = "RELAY_URL", default_value = "ws://127.0.0.1:8787/ws")]
    url: String,
    #[arg(long, env = "RELAY_ENDPOINT_ID")]
    endpoint_id: String,
    #[arg(long, env = "RELAY_TOKEN", hide_env_values = true, default_value = "")]
    token: String,
    /// Consecutive failed attempts before giving up. At least 1.
    #[arg(
        long,
        env = "RELAY_MAX_ATTEMPTS",
        default_value_t = 10,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    max_attempts: u32,
    #[arg(long, env = "RELAY_BACKOFF_BASE_MS", default_value_t = 1_000)]
    backoff_base_ms: u64,
    #[arg(long, env = "RELAY_BACKOFF_MAX_MS", default_value_t = 30_000)]
    backoff_max_ms: u64,
    /// Client ping interval. 0 disables the client heartbeat.
    #[arg(long, env = "RELAY_HEARTBEAT_SECS", default_value_t = 30)]
    heartbeat_secs: u64,
    #[arg(long, env = "RELAY_CALL_TIMEOUT_MS", default_value_t = 30_000)]
    call_timeout_ms: u64,
}

impl ConnectArgs {
    fn client_config(&self) -> ClientConfig {
        ClientConfig::new(&self.url, &self.endpoint_id, &self.token)
            .with_backoff(
                Duration::from_millis(self.backoff_base_ms),
                Duration::from_millis(self.backoff_max_ms),
            )
            .with_max_attempts(self.max_attempts)
            .with_heartbeat_interval(
                (self.heartbeat_secs > 0).then(|| Duration::from_secs(self.heartbeat_secs)),
            )
            .with_default_call_timeout(Duration::from_millis(self.call_timeout_ms))
    }
}

/// Actions this binary serves when running as an endpoint.
fn endpoint_actions(endpoint_id: &str) -> ActionTable {
    let info = json!({
        "endpointId": endpoint_id,
        "version": env!("CARGO_PKG_VERSION"),
    });
    ActionTable::new()
        .with_fn("echo", |params| async move { Ok::<_, ActionError>(params) })
        .with_fn("endpoint.info", move |_| {
            let info = info.clone();
            async move { Ok::<_, ActionError>(info) }
        })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    match Cli::parse().command {
        Command::Serve(args) => serve(&args).await,
        Command::Connect(args) => connect(&args).await,
    }
}

async fn serve(args: &ServeArgs) -> Result<()> {
    let config = args.relay_config();
    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("failed to bind {}", config.listen))?;
    let relay = Relay::new(config);

    tokio::select! {
        result = websocket::serve(relay, listener) => result.context("relay server failed")?,
        _ = tokio::signal::ctrl_c() => tracing::info!("shutting down"),
    }
    Ok(())
}

async fn connect(args: &ConnectArgs) -> Result<()> {
    let config = args.client_config();
    let connector = WebSocketConnector::new(config.url.clone());
    let client = Arc::new(ReconnectingClient::new(
        config,
        connector,
        endpoint_actions(&args.endpoint_id),
    ));

    tokio::spawn({
        let client = Arc::clone(&client);
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutting down");
                client.shutdown();
            }
        }
    });

    client
        .run()
        .await
        .with_context(|| format!("endpoint {} stopped", args.endpoint_id))
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_serve_flags_build_config() {
        let cli = Cli::try_parse_from([
            "sandbox-relay",
            "serve",
            "--listen",
            "0.0.0.0:9000",
            "--secret",
            "tok-1",
            "--heartbeat-secs",
            "5",
            "--max-pending",
            "0",
        ])
        .unwrap();
        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        let config = args.relay_config();
        assert_eq!(config.listen, "0.0.0.0:9000".parse().unwrap());
        assert_eq!(config.shared_secret.as_deref(), Some("tok-1"));
        assert_eq!(config.stale_after, Duration::from_secs(10));
        assert_eq!(config.max_pending_calls, None);
    }

    #[test]
    fn test_connect_flags_build_config() {
        let cli = Cli::try_parse_from([
            "sandbox-relay",
            "connect",
            "--endpoint-id",
            "ws-a",
            "--token",
            "tok-1",
            "--heartbeat-secs",
            "0",
            "--backoff-base-ms",
            "250",
        ])
        .unwrap();
        let Command::Connect(args) = cli.command else {
            panic!("expected connect");
        };
        let config = args.client_config();
        assert_eq!(config.endpoint_id, "ws-a");
        assert_eq!(config.credential, "tok-1");
        assert_eq!(config.heartbeat_interval, None);
        assert_eq!(config.base_delay, Duration::from_millis(250));
        assert_eq!(config.max_attempts, 10);
    }

    #[test]
    fn test_zero_max_attempts_is_rejected() {
        let err = Cli::try_parse_from([
            "sandbox-relay",
            "connect",
            "--endpoint-id",
            "ws-a",
            "--max-attempts",
            "0",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[tokio::test]
    async fn test_endpoint_actions() {
        let actions = endpoint_actions("ws-a");
        assert_eq!(actions.actions(), vec!["echo", "endpoint.info"]);

        let reply = actions
            .invoke("1".into(), "endpoint.info".into(), serde_json::Value::Null)
            .await;
        let sandbox_relay_core::Message::Response { outcome, .. } = reply else {
            panic!("Wrong message type");
        };
        assert_eq!(outcome.unwrap()["endpointId"], "ws-a");
    }
}
