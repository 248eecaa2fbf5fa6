//! Structured application errors.
//!
//! Every error that crosses a process boundary is carried as an
//! [`ApplicationError`] whose serialized shape is
//! `{status, code, message, correlation_id, details}`. The same type is used
//! on the inbound side (dispatch failures turned into error responses) and on
//! the outbound side (remote error documents parsed back from response
//! bodies), so a gateway and a client talking to each other round-trip errors
//! without loss.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Error codes
// ---------------------------------------------------------------------------

/// Well-known error codes used across the dispatch path and the client.
pub mod codes {
    /// A body that had to be JSON could not be decoded.
    pub const INVALID_JSON: &str = "INVALID_JSON";
    /// The request carried no command, in query or body.
    pub const NO_COMMAND: &str = "NO_COMMAND";
    /// The command did not resolve to a registered action.
    pub const NO_ACTION: &str = "NO_ACTION";
    /// A validation schema rejected the request parameters.
    pub const VALIDATION_FAILED: &str = "VALIDATION_FAILED";
    /// All transport attempts were exhausted without an HTTP response.
    pub const COMMUNICATION_ERROR: &str = "COMMUNICATION_ERROR";
    /// The caller cancelled the call while it was waiting to retry.
    pub const CONTEXT_CANCELLED: &str = "CONTEXT_CANCELLED";
    /// A lookup produced no result.
    pub const NOT_FOUND: &str = "NOT_FOUND";
    /// An action failed in an unexpected, non-recoverable way.
    pub const INTERNAL: &str = "INTERNAL";
}

// ---------------------------------------------------------------------------
// ApplicationError
// ---------------------------------------------------------------------------

/// A structured error with a stable wire representation.
///
/// `status` carries the HTTP status code the error maps to (0 when unknown,
/// e.g. freshly deserialized from a non-conforming body). `details` is an
/// open JSON value for machine-readable context; `cause` preserves the
/// message of an underlying failure and is never required to be parseable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ApplicationError {
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub correlation_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl ApplicationError {
    /// Creates an error with an explicit status code.
    #[must_use]
    pub fn new(status: u16, correlation_id: &str, code: &str, message: &str) -> Self {
        Self {
            status,
            code: code.to_string(),
            message: message.to_string(),
            correlation_id: correlation_id.to_string(),
            details: None,
            cause: None,
        }
    }

    /// A client-side (400) error: bad payloads, routing misses, rejected
    /// parameters.
    #[must_use]
    pub fn bad_request(correlation_id: &str, code: &str, message: &str) -> Self {
        Self::new(400, correlation_id, code, message)
    }

    /// A not-found (404) error.
    #[must_use]
    pub fn not_found(correlation_id: &str, code: &str, message: &str) -> Self {
        Self::new(404, correlation_id, code, message)
    }

    /// A server-side (500) error: faults the caller cannot fix by changing
    /// the request.
    #[must_use]
    pub fn internal(correlation_id: &str, code: &str, message: &str) -> Self {
        Self::new(500, correlation_id, code, message)
    }

    /// Attaches machine-readable details.
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Records the message of the underlying failure.
    #[must_use]
    pub fn with_cause(mut self, cause: impl std::fmt::Display) -> Self {
        self.cause = Some(cause.to_string());
        self
    }

    /// Overrides the HTTP status, e.g. after classifying a remote response.
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn constructors_set_status() {
        assert_eq!(ApplicationError::bad_request("c1", codes::NO_COMMAND, "m").status, 400);
        assert_eq!(ApplicationError::not_found("c1", codes::NOT_FOUND, "m").status, 404);
        assert_eq!(ApplicationError::internal("c1", codes::INTERNAL, "m").status, 500);
    }

    #[test]
    fn wire_shape_omits_empty_optionals() {
        let err = ApplicationError::bad_request("abc", codes::NO_ACTION, "Action ghost.op was not found");
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(
            value,
            json!({
                "status": 400,
                "code": "NO_ACTION",
                "message": "Action ghost.op was not found",
                "correlation_id": "abc",
            })
        );
    }

    #[test]
    fn deserializes_partial_documents() {
        // Remote peers are not required to fill every field.
        let err: ApplicationError =
            serde_json::from_str(r#"{"status":404,"code":"NOT_FOUND","message":"missing"}"#).unwrap();
        assert_eq!(err.status, 404);
        assert_eq!(err.code, "NOT_FOUND");
        assert_eq!(err.message, "missing");
        assert_eq!(err.correlation_id, "");
        assert!(err.details.is_none());
    }

    #[test]
    fn details_and_cause_round_trip() {
        let err = ApplicationError::internal("c2", codes::COMMUNICATION_ERROR, "gone")
            .with_details(json!({"attempts": 3}))
            .with_cause("connection refused");
        let back: ApplicationError =
            serde_json::from_str(&serde_json::to_string(&err).unwrap()).unwrap();
        assert_eq!(back, err);
    }

    #[test]
    fn display_is_code_and_message() {
        let err = ApplicationError::bad_request("c", codes::INVALID_JSON, "Invalid json format");
        assert_eq!(err.to_string(), "INVALID_JSON: Invalid json format");
    }
}
