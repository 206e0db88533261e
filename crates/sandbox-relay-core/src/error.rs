//! Error taxonomy shared by the relay and the remote endpoint.

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by relay calls.
///
/// The `Display` form doubles as the wire form of the `error` field:
/// `<Kind>` or `<Kind>: <detail>`. [`RelayError::from_wire`] maps it back.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    #[error("NotAuthenticated")]
    NotAuthenticated,
    #[error("EndpointUnreachable: {0}")]
    EndpointUnreachable(String),
    #[error("NoEndpointsAvailable")]
    NoEndpointsAvailable,
    #[error("UnknownAction: {0}")]
    UnknownAction(String),
    #[error("HandlerFailed: {0}")]
    HandlerFailed(String),
    #[error("Timeout: no response after {} ms", .0.as_millis())]
    Timeout(Duration),
    #[error("ConnectionLost")]
    ConnectionLost,
    #[error("MalformedEnvelope: {0}")]
    MalformedEnvelope(String),
    /// Reconnect attempts exhausted. The only fatal condition.
    #[error("GiveUp: reconnect abandoned after {attempts} attempts")]
    GiveUp { attempts: u32 },
    #[error("NotConnected")]
    NotConnected,
    #[error("TooManyPendingCalls: limit of {limit} in-flight calls reached")]
    TooManyPendingCalls { limit: usize },
    /// Error text from the peer that does not match a known kind.
    #[error("{0}")]
    Remote(String),
    #[error("Transport: {0}")]
    Transport(String),
}

impl RelayError {
    /// Short kind name, stable across detail changes.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NotAuthenticated => "NotAuthenticated",
            Self::EndpointUnreachable(_) => "EndpointUnreachable",
            Self::NoEndpointsAvailable => "NoEndpointsAvailable",
            Self::UnknownAction(_) => "UnknownAction",
            Self::HandlerFailed(_) => "HandlerFailed",
            Self::Timeout(_) => "Timeout",
            Self::ConnectionLost => "ConnectionLost",
            Self::MalformedEnvelope(_) => "MalformedEnvelope",
            Self::GiveUp { .. } => "GiveUp",
            Self::NotConnected => "NotConnected",
            Self::TooManyPendingCalls { .. } => "TooManyPendingCalls",
            Self::Remote(_) => "Remote",
            Self::Transport(_) => "Transport",
        }
    }

    /// Parse the `error` field of a failed response.
    #[must_use]
    pub fn from_wire(text: &str) -> Self {
        let (kind, detail) = text.split_once(": ").unwrap_or((text, ""));
        match kind {
            "NotAuthenticated" => Self::NotAuthenticated,
            "NoEndpointsAvailable" => Self::NoEndpointsAvailable,
            "ConnectionLost" => Self::ConnectionLost,
            "NotConnected" => Self::NotConnected,
            "EndpointUnreachable" => Self::EndpointUnreachable(detail.to_string()),
            "UnknownAction" => Self::UnknownAction(detail.to_string()),
            "HandlerFailed" => Self::HandlerFailed(detail.to_string()),
            "MalformedEnvelope" => Self::MalformedEnvelope(detail.to_string()),
            "Transport" => Self::Transport(detail.to_string()),
            "Timeout" => first_number(detail)
                .map_or_else(|| Self::Remote(text.to_string()), |ms| {
                    Self::Timeout(Duration::from_millis(ms))
                }),
            "GiveUp" => first_number(detail)
                .and_then(|n| u32::try_from(n).ok())
                .map_or_else(|| Self::Remote(text.to_string()), |attempts| {
                    Self::GiveUp { attempts }
                }),
            "TooManyPendingCalls" => first_number(detail)
                .and_then(|n| usize::try_from(n).ok())
                .map_or_else(|| Self::Remote(text.to_string()), |limit| {
                    Self::TooManyPendingCalls { limit }
                }),
            _ => Self::Remote(text.to_string()),
        }
    }

    /// Render for the `error` field of a response envelope.
    #[must_use]
    pub fn to_wire(&self) -> String {
        self.to_string()
    }
}

/// First whitespace-separated token of `detail` that parses as an integer.
fn first_number(detail: &str) -> Option<u64> {
    detail.split_whitespace().find_map(|word| word.parse().ok())
}
