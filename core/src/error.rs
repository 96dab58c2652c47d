//! Error types for the feed client.
//!
//! # Design
//! `ApiError` is what the sans-IO parser reports about one response.
//! `TransportError` is what a `Transport` reports when no response arrived.
//! The service layer folds both into `ServiceError`, which always carries a
//! message fit for display. Hooks never see the first two.

use thiserror::Error;

/// Errors returned by `FeedClient` build and parse methods.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server returned 404.
    #[error("resource not found")]
    NotFound { body: String },

    /// The server returned a non-2xx status other than 404.
    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    /// The server answered 2xx but reported `"success": false`.
    #[error("request rejected: {0}")]
    Rejected(String),

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    DeserializationError(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    SerializationError(String),
}

impl ApiError {
    /// Human-readable message the server put in the error body, if any.
    pub fn server_message(&self) -> Option<String> {
        match self {
            ApiError::NotFound { body } | ApiError::HttpError { body, .. } => message_from_body(body),
            ApiError::Rejected(message) if !message.is_empty() => Some(message.clone()),
            _ => None,
        }
    }
}

/// Pull `message` (or `error`) out of a JSON error body.
pub(crate) fn message_from_body(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["message", "error"]
        .iter()
        .filter_map(|key| value.get(*key).and_then(|v| v.as_str()))
        .find(|message| !message.trim().is_empty())
        .map(str::to_string)
}

/// Failure to complete an HTTP round-trip at all.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Other(String),
}

/// Broad category of a service failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// No response was received.
    Transport,
    /// The server answered with a non-2xx status.
    Server { status: u16 },
    /// The server answered 2xx with `"success": false`.
    Rejected,
    /// A payload could not be encoded or a response could not be decoded.
    Malformed,
}

/// The failure half of every service result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ServiceError {
    pub kind: FailureKind,
    pub message: String,
}

impl ServiceError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub(crate) fn from_api(err: ApiError, fallback: &str) -> Self {
        let message = err.server_message().unwrap_or_else(|| fallback.to_string());
        let kind = match err {
            ApiError::NotFound { .. } => FailureKind::Server { status: 404 },
            ApiError::HttpError { status, .. } => FailureKind::Server { status },
            ApiError::Rejected(_) => FailureKind::Rejected,
            ApiError::DeserializationError(_) | ApiError::SerializationError(_) => FailureKind::Malformed,
        };
        Self { kind, message }
    }

    pub(crate) fn from_transport(err: TransportError, fallback: &str) -> Self {
        let message = match &err {
            TransportError::Connect(detail) | TransportError::Other(detail) if detail.trim().is_empty() => {
                fallback.to_string()
            }
            other => other.to_string(),
        };
        Self {
            kind: FailureKind::Transport,
            message,
        }
    }
}

/// Invalid client configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} is not a valid number: {value}")]
    InvalidNumber { name: &'static str, value: String },

    #[error("{name} must not be empty")]
    Empty { name: &'static str },
}
