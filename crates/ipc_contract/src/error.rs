//! Host-bridge failure taxonomy and the normalizer every call site funnels failures through.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Taxonomy tag carried by every [`HostError`].
pub const HOST_ERROR_NAME: &str = "ProcessConnectionError";

/// Uniform failure shape for any call that crosses into the host process.
///
/// A `HostError` is always built by wrapping whatever the bridge rejected with (see
/// [`normalize_failure`]); raw bridge failures never reach request consumers.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{name}: {}", .message.as_deref().unwrap_or("host call failed"))]
pub struct HostError {
    /// Taxonomy tag, always [`HOST_ERROR_NAME`].
    pub name: String,
    /// Human-readable failure text when the host supplied one.
    pub message: Option<String>,
    /// Optional numeric status code.
    pub status: Option<u32>,
}

/// Flat error object suitable for logging or handing to a presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedHostError {
    /// Taxonomy tag.
    pub name: String,
    /// Human-readable failure text.
    pub message: Option<String>,
    /// Optional numeric status code.
    pub status: Option<u32>,
}

impl HostError {
    /// Creates a taxonomy error carrying `message`.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            name: HOST_ERROR_NAME.to_string(),
            message: Some(message.into()),
            status: None,
        }
    }

    /// Attaches a numeric status code.
    pub fn with_status(mut self, status: u32) -> Self {
        self.status = Some(status);
        self
    }

    /// Returns the message text, or an empty string when the host gave none.
    pub fn message_or_empty(&self) -> &str {
        self.message.as_deref().unwrap_or_default()
    }

    /// Converts into the flat serialized form.
    pub fn to_serialized(&self) -> SerializedHostError {
        SerializedHostError {
            name: self.name.clone(),
            message: self.message.clone(),
            status: self.status,
        }
    }
}

/// Raw failure shapes a bridge transport may reject with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeFailure {
    /// The transport already produced a taxonomy error.
    Host(HostError),
    /// A generic failure object or plain string rejection carrying a message.
    Message(String),
    /// Anything else, rendered to text by the transport.
    Unrecognized(String),
}

impl From<HostError> for BridgeFailure {
    fn from(error: HostError) -> Self {
        Self::Host(error)
    }
}

/// Translates a raw bridge failure into the single [`HostError`] taxonomy.
///
/// Taxonomy errors are rewrapped field-by-field (never nested), message-bearing failures keep
/// their message, and unrecognized values are wrapped with their rendered text.
pub fn normalize_failure(failure: BridgeFailure) -> HostError {
    match failure {
        BridgeFailure::Host(error) => HostError {
            name: HOST_ERROR_NAME.to_string(),
            message: error.message,
            status: error.status,
        },
        BridgeFailure::Message(message) => HostError::new(message),
        BridgeFailure::Unrecognized(raw) => {
            HostError::new(format!("unrecognized host failure: {raw}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn taxonomy_errors_are_rewrapped_not_nested() {
        let original = HostError::new("pipe closed").with_status(503);
        let normalized = normalize_failure(BridgeFailure::Host(original.clone()));
        assert_eq!(normalized, original);
        assert_eq!(normalized.to_string(), "ProcessConnectionError: pipe closed");
    }

    #[test]
    fn foreign_tagged_host_errors_are_retagged() {
        let foreign = HostError {
            name: "SomethingElse".to_string(),
            message: None,
            status: Some(1),
        };
        let normalized = normalize_failure(BridgeFailure::Host(foreign));
        assert_eq!(normalized.name, HOST_ERROR_NAME);
        assert_eq!(normalized.status, Some(1));
        assert_eq!(normalized.to_string(), "ProcessConnectionError: host call failed");
    }

    #[test]
    fn message_failures_keep_their_text() {
        let normalized = normalize_failure(BridgeFailure::Message("network down".to_string()));
        assert_eq!(normalized.message.as_deref(), Some("network down"));
        assert_eq!(normalized.status, None);
    }

    #[test]
    fn unrecognized_failures_are_still_wrapped() {
        let normalized = normalize_failure(BridgeFailure::Unrecognized("42".to_string()));
        assert_eq!(normalized.name, HOST_ERROR_NAME);
        assert_eq!(normalized.message_or_empty(), "unrecognized host failure: 42");
    }

    #[test]
    fn serialized_form_matches_rejection_object_shape() {
        let error = HostError::new("boom").with_status(7);
        let value = serde_json::to_value(error.to_serialized()).expect("serialize");
        assert_eq!(
            value,
            serde_json::json!({"name": "ProcessConnectionError", "message": "boom", "status": 7})
        );
        let parsed: HostError = serde_json::from_value(value).expect("parse");
        assert_eq!(parsed, error);
    }
}
