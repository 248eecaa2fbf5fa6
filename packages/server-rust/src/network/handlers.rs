//! Axum handlers: the single entry point plus a liveness probe.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, Method, StatusCode};
use bytes::Bytes;

use crate::gateway::FunctionGateway;
use crate::request::FunctionRequest;
use crate::response::ActionResponse;

/// The sole dispatch handler: buffers the body, lifts the HTTP parts into a
/// [`FunctionRequest`], and hands it to the gateway. Everything else --
/// command resolution, validation, interceptors -- happens inside
/// [`FunctionGateway::execute`].
pub async fn entry_handler(
    State(gateway): State<Arc<FunctionGateway>>,
    method: Method,
    Query(query): Query<Vec<(String, String)>>,
    headers: HeaderMap,
    body: Bytes,
) -> ActionResponse {
    gateway
        .execute(FunctionRequest::new(method, query, headers, body))
        .await
}

/// Liveness probe -- always returns 200 OK.
///
/// Only checks that the process is running and responsive; readiness is the
/// gateway's own concern (it opens itself on the first dispatch).
pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::*;

    #[tokio::test]
    async fn liveness_handler_always_returns_200() {
        let status = liveness_handler().await;
        assert_eq!(status, StatusCode::OK);
    }
}
