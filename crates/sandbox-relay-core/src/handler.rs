//! Action handlers: the open, string-keyed side of dispatch.

use std::{any::Any, collections::HashMap, future::Future, panic::AssertUnwindSafe, sync::Arc};

use async_trait::async_trait;
use futures::{FutureExt, future::BoxFuture};
use serde_json::Value;
use thiserror::Error;

use crate::{Message, RelayError};

/// Error returned by an action handler.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("invalid params: {0}")]
    InvalidParams(#[from] serde_json::Error),
    #[error("{0}")]
    Failed(String),
}

impl ActionError {
    /// Generic failure with a message.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Trait for actions executed on behalf of the peer.
///
/// Implement this for each remote operation (file read, shell command, ...).
/// Params and results are opaque JSON to the relay.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Execute the action.
    async fn handle(&self, params: Value) -> Result<Value, ActionError>;
}

/// Adapter turning an async closure into an [`ActionHandler`].
struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> ActionHandler for FnHandler<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, ActionError>> + Send + 'static,
{
    async fn handle(&self, params: Value) -> Result<Value, ActionError> {
        (self.0)(params).await
    }
}

/// Registered action handlers, keyed by action name.
#[derive(Clone, Default)]
pub struct ActionTable {
    handlers: HashMap<String, Arc<dyn ActionHandler>>,
}

impl ActionTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing any previous one for `action`.
    pub fn register(
        &mut self,
        action: impl Into<String>,
        handler: impl ActionHandler + 'static,
    ) -> &mut Self {
        self.handlers.insert(action.into(), Arc::new(handler));
        self
    }

    /// Register an async closure.
    pub fn register_fn<F, Fut>(&mut self, action: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ActionError>> + Send + 'static,
    {
        self.register(action, FnHandler(f))
    }

    /// Builder form of [`register_fn`](Self::register_fn).
    #[must_use]
    pub fn with_fn<F, Fut>(mut self, action: impl Into<String>, f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ActionError>> + Send + 'static,
    {
        self.register_fn(action, f);
        self
    }

    #[must_use]
    pub fn contains(&self, action: &str) -> bool {
        self.handlers.contains_key(action)
    }

    /// Registered action names, sorted.
    #[must_use]
    pub fn actions(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Run `action` and build the response for call `id`.
    ///
    /// The returned future never panics: a missing handler yields
    /// `UnknownAction`, a handler error or panic yields `HandlerFailed`.
    #[must_use]
    pub fn invoke(&self, id: String, action: String, params: Value) -> BoxFuture<'static, Message> {
        let Some(handler) = self.handlers.get(&action).cloned() else {
            tracing::debug!(call_id = %id, %action, "no handler for action");
            return futures::future::ready(Message::err(id, RelayError::UnknownAction(action)))
                .boxed();
        };

        async move {
            let outcome = match AssertUnwindSafe(handler.handle(params)).catch_unwind().await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(e)) => Err(RelayError::HandlerFailed(e.to_string())),
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    tracing::error!(call_id = %id, %action, "action handler panicked: {message}");
                    Err(RelayError::HandlerFailed(message))
                }
            };
            if let Err(e) = &outcome {
                tracing::debug!(call_id = %id, %action, "action failed: {e}");
            }
            Message::Response { id, outcome }
        }
        .boxed()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "handler panicked".to_string())
}
