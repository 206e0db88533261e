//! Wire envelope and codec.
//!
//! On the wire every message is one flat JSON object ([`Envelope`]).
//! Inside the crate it is decoded into the closed [`Message`] enum so the
//! relay's own control protocol is matched exhaustively.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::RelayError;

/// Envelope kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnvelopeKind {
    Call,
    Response,
    Auth,
    RegisterEndpoint,
    Ping,
    Pong,
    Error,
}

/// The unit on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub kind: EnvelopeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl Envelope {
    fn bare(kind: EnvelopeKind, id: Option<String>) -> Self {
        Self {
            id,
            kind,
            action: None,
            params: None,
            result: None,
            error: None,
            endpoint_id: None,
            credential: None,
        }
    }
}

/// A validated envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Invoke `action` on the peer.
    Call {
        id: String,
        action: String,
        params: Value,
    },
    /// Settles the call with the same id.
    Response {
        id: String,
        outcome: Result<Value, RelayError>,
    },
    /// Present a credential.
    Auth { id: String, credential: String },
    /// Bind the connection to a logical endpoint.
    RegisterEndpoint { id: String, endpoint_id: String },
    Ping { id: Option<String> },
    Pong { id: Option<String> },
    /// Out-of-band protocol error.
    Error { id: Option<String>, message: String },
}

impl Message {
    /// Successful response.
    #[must_use]
    pub fn ok(id: String, result: Value) -> Self {
        Self::Response {
            id,
            outcome: Ok(result),
        }
    }

    /// Failed response.
    #[must_use]
    pub fn err(id: String, error: RelayError) -> Self {
        Self::Response {
            id,
            outcome: Err(error),
        }
    }

    /// Acknowledgement of a successful `auth`.
    #[must_use]
    pub fn auth_ack(id: String, identity: &str) -> Self {
        Self::ok(id, json!({ "accepted": true, "identity": identity }))
    }

    /// Acknowledgement of a successful `register-endpoint`.
    #[must_use]
    pub fn register_ack(id: String, endpoint_id: &str) -> Self {
        Self::ok(id, json!({ "endpointId": endpoint_id }))
    }

    #[must_use]
    pub const fn kind(&self) -> EnvelopeKind {
        match self {
            Self::Call { .. } => EnvelopeKind::Call,
            Self::Response { .. } => EnvelopeKind::Response,
            Self::Auth { .. } => EnvelopeKind::Auth,
            Self::RegisterEndpoint { .. } => EnvelopeKind::RegisterEndpoint,
            Self::Ping { .. } => EnvelopeKind::Ping,
            Self::Pong { .. } => EnvelopeKind::Pong,
            Self::Error { .. } => EnvelopeKind::Error,
        }
    }

    /// Correlation id, if any.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Call { id, .. }
            | Self::Response { id, .. }
            | Self::Auth { id, .. }
            | Self::RegisterEndpoint { id, .. } => Some(id),
            Self::Ping { id } | Self::Pong { id } | Self::Error { id, .. } => id.as_deref(),
        }
    }

    /// Serialize to a text frame.
    ///
    /// # Errors
    /// Returns `MalformedEnvelope` if the payload cannot be serialized.
    pub fn encode(&self) -> Result<String, RelayError> {
        serde_json::to_string(&Envelope::from(self.clone()))
            .map_err(|e| RelayError::MalformedEnvelope(e.to_string()))
    }

    /// Parse and validate a text frame.
    ///
    /// # Errors
    /// Returns `MalformedEnvelope` for invalid JSON, an unknown kind, or a
    /// missing required field.
    pub fn decode(raw: &str) -> Result<Self, RelayError> {
        let envelope: Envelope =
            serde_json::from_str(raw).map_err(|e| RelayError::MalformedEnvelope(e.to_string()))?;
        Self::try_from(envelope)
    }
}

fn required(field: Option<String>, name: &str, kind: EnvelopeKind) -> Result<String, RelayError> {
    field.ok_or_else(|| RelayError::MalformedEnvelope(format!("{kind:?} envelope without {name}")))
}

impl TryFrom<Envelope> for Message {
    type Error = RelayError;

    fn try_from(env: Envelope) -> Result<Self, RelayError> {
        let kind = env.kind;
        Ok(match kind {
            EnvelopeKind::Call => Message::Call {
                id: required(env.id, "id", kind)?,
                action: required(env.action, "action", kind)?,
                params: env.params.unwrap_or(Value::Null),
            },
            EnvelopeKind::Response => {
                let id = required(env.id, "id", kind)?;
                let outcome = match env.error {
                    Some(error) => Err(RelayError::from_wire(&error)),
                    None => Ok(env.result.unwrap_or(Value::Null)),
                };
                Message::Response { id, outcome }
            }
            EnvelopeKind::Auth => Message::Auth {
                id: required(env.id, "id", kind)?,
                credential: required(env.credential, "credential", kind)?,
            },
            EnvelopeKind::RegisterEndpoint => Message::RegisterEndpoint {
                id: required(env.id, "id", kind)?,
                endpoint_id: required(env.endpoint_id, "endpointId", kind)?,
            },
            EnvelopeKind::Ping => Message::Ping { id: env.id },
            EnvelopeKind::Pong => Message::Pong { id: env.id },
            EnvelopeKind::Error => Message::Error {
                id: env.id,
                message: env.error.unwrap_or_default(),
            },
        })
    }
}

impl From<Message> for Envelope {
    fn from(message: Message) -> Self {
        let kind = message.kind();
        match message {
            Message::Call { id, action, params } => Self {
                action: Some(action),
                params: Some(params),
                ..Self::bare(kind, Some(id))
            },
            Message::Response { id, outcome } => match outcome {
                Ok(result) => Self {
                    result: Some(result),
                    ..Self::bare(kind, Some(id))
                },
                Err(error) => Self {
                    error: Some(error.to_wire()),
                    ..Self::bare(kind, Some(id))
                },
            },
            Message::Auth { id, credential } => Self {
                credential: Some(credential),
                ..Self::bare(kind, Some(id))
            },
            Message::RegisterEndpoint { id, endpoint_id } => Self {
                endpoint_id: Some(endpoint_id),
                ..Self::bare(kind, Some(id))
            },
            Message::Ping { id } | Message::Pong { id } => Self::bare(kind, id),
            Message::Error { id, message } => Self {
                error: Some(message),
                ..Self::bare(kind, id)
            },
        }
    }
}
