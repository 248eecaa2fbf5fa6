//! Terminal response classification.
//!
//! Once an HTTP response arrives (no more retries apply), its status code
//! decides the outcome: `204` is an empty success, `>= 400` is parsed into a
//! structured error document (falling back to the raw body text), anything
//! else is a success whose payload belongs to the caller.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use funcgate_core::{codes, ApplicationError};

// ---------------------------------------------------------------------------
// InvocationOutcome
// ---------------------------------------------------------------------------

/// The terminal result of one invocation, after retries are exhausted or a
/// terminal response is received. Exactly one variant per call.
#[derive(Debug)]
#[must_use]
pub enum InvocationOutcome {
    /// A 2xx/3xx response carrying a payload.
    Success(ResponsePayload),
    /// A 204 response; the body was consumed and discarded.
    NoContent,
    /// A structured error: a remote error document (best-effort parsed, raw
    /// text preserved otherwise) or a locally synthesized precondition
    /// failure. The HTTP status is attached whenever one was received.
    StructuredError(ApplicationError),
    /// The transport never produced a status: retry budget exhausted
    /// (`COMMUNICATION_ERROR`) or the caller cancelled the wait
    /// (`CONTEXT_CANCELLED`). The cause is preserved on the error.
    TransportFailure(ApplicationError),
}

impl InvocationOutcome {
    /// Collapses the outcome into a conventional result:
    /// payload / empty / error.
    ///
    /// # Errors
    ///
    /// Returns the structured error or transport failure unchanged.
    pub fn into_result(self) -> Result<Option<ResponsePayload>, ApplicationError> {
        match self {
            Self::Success(payload) => Ok(Some(payload)),
            Self::NoContent => Ok(None),
            Self::StructuredError(err) | Self::TransportFailure(err) => Err(err),
        }
    }
}

/// A successful response body plus the status it arrived with.
#[derive(Debug, Clone)]
pub struct ResponsePayload {
    pub status: u16,
    pub body: Bytes,
}

impl ResponsePayload {
    /// Decodes the payload as JSON.
    ///
    /// # Errors
    ///
    /// Returns `INVALID_JSON` when the body does not decode into `T`.
    pub fn json<T: DeserializeOwned>(&self, correlation_id: &str) -> Result<T, ApplicationError> {
        serde_json::from_slice(&self.body).map_err(|err| {
            ApplicationError::internal(
                correlation_id,
                codes::INVALID_JSON,
                "Failed to decode response payload",
            )
            .with_cause(err)
        })
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Classifies a received HTTP response into its terminal outcome.
///
/// A body-read failure after the status line counts as a transport failure:
/// the response can no longer be interpreted either way.
pub async fn classify_response(
    response: reqwest::Response,
    correlation_id: &str,
) -> InvocationOutcome {
    let status = response.status().as_u16();

    if status == 204 {
        // Consume whatever the peer sent so the connection can be reused.
        let _ = response.bytes().await;
        return InvocationOutcome::NoContent;
    }

    let body = match response.bytes().await {
        Ok(body) => body,
        Err(err) => {
            return InvocationOutcome::TransportFailure(
                ApplicationError::internal(
                    correlation_id,
                    codes::COMMUNICATION_ERROR,
                    "Failed to read response body",
                )
                .with_status(status)
                .with_cause(err),
            );
        }
    };

    if status >= 400 {
        return InvocationOutcome::StructuredError(parse_error_body(status, &body, correlation_id));
    }

    InvocationOutcome::Success(ResponsePayload { status, body })
}

/// Parses an error response body, best-effort.
///
/// A conforming error document passes through with its fields intact. A
/// non-conforming JSON object lands under `details`; a non-JSON body becomes
/// the error message verbatim. The received HTTP status always wins over
/// whatever the body claimed.
pub fn parse_error_body(status: u16, body: &[u8], correlation_id: &str) -> ApplicationError {
    let mut err: ApplicationError = serde_json::from_slice(body).unwrap_or_default();

    if err.status == 0 && !body.is_empty() {
        // Not a conforming error document.
        match serde_json::from_slice::<Map<String, Value>>(body) {
            Ok(values) => err.details = Some(Value::Object(values)),
            Err(_) => err.message = String::from_utf8_lossy(body).into_owned(),
        }
    }

    if err.correlation_id.is_empty() {
        err.correlation_id = correlation_id.to_string();
    }
    err.status = status;
    err
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn conforming_error_document_passes_through() {
        let body = br#"{"status":404,"code":"NOT_FOUND","message":"missing"}"#;
        let err = parse_error_body(404, body, "c1");
        assert_eq!(err.status, 404);
        assert_eq!(err.code, "NOT_FOUND");
        assert_eq!(err.message, "missing");
        assert_eq!(err.correlation_id, "c1");
    }

    #[test]
    fn plain_text_body_becomes_the_message() {
        let err = parse_error_body(404, b"plain text", "c1");
        assert_eq!(err.status, 404);
        assert_eq!(err.code, "");
        assert_eq!(err.message, "plain text");
    }

    #[test]
    fn non_conforming_json_object_lands_in_details() {
        let err = parse_error_body(500, br#"{"oops":true}"#, "c1");
        assert_eq!(err.status, 500);
        assert_eq!(err.message, "");
        assert_eq!(err.details, Some(json!({"oops": true})));
    }

    #[test]
    fn received_status_wins_over_body_status() {
        let body = br#"{"status":400,"code":"BAD","message":"m"}"#;
        let err = parse_error_body(503, body, "c1");
        assert_eq!(err.status, 503);
        assert_eq!(err.code, "BAD");
    }

    #[test]
    fn document_correlation_id_is_preserved() {
        let body = br#"{"status":400,"code":"BAD","message":"m","correlation_id":"remote"}"#;
        let err = parse_error_body(400, body, "local");
        assert_eq!(err.correlation_id, "remote");
    }

    #[test]
    fn empty_body_keeps_defaults_plus_status() {
        let err = parse_error_body(502, b"", "c1");
        assert_eq!(err.status, 502);
        assert_eq!(err.code, "");
        assert_eq!(err.message, "");
    }

    #[test]
    fn into_result_maps_variants() {
        let payload = ResponsePayload {
            status: 200,
            body: Bytes::from_static(b"{\"a\":1}"),
        };
        assert!(InvocationOutcome::Success(payload).into_result().unwrap().is_some());
        assert!(InvocationOutcome::NoContent.into_result().unwrap().is_none());

        let err = ApplicationError::bad_request("c", "X", "m");
        assert!(InvocationOutcome::StructuredError(err).into_result().is_err());
    }

    #[test]
    fn payload_json_decodes() {
        let payload = ResponsePayload {
            status: 200,
            body: Bytes::from_static(br#"{"id":"42"}"#),
        };
        let value: serde_json::Value = payload.json("c1").unwrap();
        assert_eq!(value["id"], "42");
    }
}
