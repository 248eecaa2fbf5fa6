//! Action responses and the response-sender helpers.
//!
//! Handlers produce an [`ActionResponse`]; the free functions below encode
//! the conventional CRUD outcomes (`send_result`, `send_created_result`,
//! `send_deleted_result`, `send_empty_result`, `send_error`) so individual
//! actions do not reinvent status-code mapping. The helpers are stateless on
//! purpose: there is no sender object to construct or wire.

use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use http::{header, HeaderValue, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use funcgate_core::{codes, ApplicationError};

// ---------------------------------------------------------------------------
// ActionResponse
// ---------------------------------------------------------------------------

/// The response produced by an action handler: a status code plus an
/// optional JSON body.
#[derive(Debug, Clone)]
pub struct ActionResponse {
    status: StatusCode,
    body: Bytes,
}

impl ActionResponse {
    /// Builds a JSON response with the given status.
    ///
    /// A payload that fails to serialize (practically unreachable for the
    /// types flowing through here) degrades to a 500 error document instead
    /// of panicking the dispatch path.
    #[must_use]
    pub fn json<T: Serialize>(status: StatusCode, payload: &T) -> Self {
        match serde_json::to_vec(payload) {
            Ok(body) => Self {
                status,
                body: Bytes::from(body),
            },
            Err(err) => send_error(
                &ApplicationError::internal("", codes::INTERNAL, "Failed to serialize response")
                    .with_cause(err),
            ),
        }
    }

    /// A bodiless 204 response.
    #[must_use]
    pub fn no_content() -> Self {
        Self {
            status: StatusCode::NO_CONTENT,
            body: Bytes::new(),
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Decodes the JSON body into `T`.
    ///
    /// # Errors
    ///
    /// Returns the underlying decode error; mostly used by tests and
    /// in-process callers.
    pub fn decode_json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

impl IntoResponse for ActionResponse {
    fn into_response(self) -> Response {
        if self.body.is_empty() {
            self.status.into_response()
        } else {
            (
                self.status,
                [(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                )],
                self.body,
            )
                .into_response()
        }
    }
}

// ---------------------------------------------------------------------------
// Response senders
// ---------------------------------------------------------------------------

/// Sends a lookup/exec result: errors as error documents, `None` as a 404,
/// values as 200 with a JSON body.
pub fn send_result<T: Serialize>(
    correlation_id: &str,
    result: Result<Option<T>, ApplicationError>,
) -> ActionResponse {
    match result {
        Err(err) => send_error(&err),
        Ok(None) => send_error(&ApplicationError::not_found(
            correlation_id,
            codes::NOT_FOUND,
            "Requested entity was not found",
        )),
        Ok(Some(value)) => ActionResponse::json(StatusCode::OK, &value),
    }
}

/// Sends a creation result: 201 with the created entity, 204 when the
/// operation produced nothing.
pub fn send_created_result<T: Serialize>(
    result: Result<Option<T>, ApplicationError>,
) -> ActionResponse {
    match result {
        Err(err) => send_error(&err),
        Ok(None) => ActionResponse::no_content(),
        Ok(Some(value)) => ActionResponse::json(StatusCode::CREATED, &value),
    }
}

/// Sends a deletion result: 200 with the removed entity, 204 when nothing
/// was there to remove.
pub fn send_deleted_result<T: Serialize>(
    result: Result<Option<T>, ApplicationError>,
) -> ActionResponse {
    match result {
        Err(err) => send_error(&err),
        Ok(None) => ActionResponse::no_content(),
        Ok(Some(value)) => ActionResponse::json(StatusCode::OK, &value),
    }
}

/// Sends a bodiless success, or the error document.
pub fn send_empty_result(result: Result<(), ApplicationError>) -> ActionResponse {
    match result {
        Err(err) => send_error(&err),
        Ok(()) => ActionResponse::no_content(),
    }
}

/// Sends a structured error document with the error's own status code
/// (500 when the error does not carry one).
pub fn send_error(err: &ApplicationError) -> ActionResponse {
    let status =
        StatusCode::from_u16(err.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let status = if status == StatusCode::OK {
        // A zero/unset status deserializes to something nonsensical for an
        // error; treat it as a server fault.
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        status
    };
    ActionResponse::json(status, err)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
