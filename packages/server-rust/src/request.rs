//! Buffered request model with correlation/command extraction.
//!
//! The gateway buffers each request body into [`bytes::Bytes`] at the
//! transport boundary, so command extraction, validation, and the action
//! handler all read the same bytes without a rehydration dance: cloning the
//! handle is cheap and the underlying buffer is immutable.

use bytes::Bytes;
use http::{HeaderMap, Method};
use serde::de::DeserializeOwned;
use serde_json::Value;

use funcgate_core::{codes, ApplicationError, Parameters};

/// Query parameter and header carrying the correlation id.
pub const CORRELATION_ID: &str = "correlation_id";
/// Query parameter and body field carrying the command name.
pub const COMMAND: &str = "cmd";

/// A transport-independent view of one inbound invocation.
///
/// Built once per request from the HTTP parts; everything downstream
/// (interceptors, validation, handlers) reads from this value. Cloning is
/// cheap (the body is a shared buffer), which is what lets interceptors
/// re-extract the command from the live request.
#[derive(Debug, Clone)]
pub struct FunctionRequest {
    method: Method,
    query: Vec<(String, String)>,
    path_vars: Vec<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
}

impl FunctionRequest {
    /// Creates a request from its transport parts.
    #[must_use]
    pub fn new(
        method: Method,
        query: Vec<(String, String)>,
        headers: HeaderMap,
        body: Bytes,
    ) -> Self {
        Self {
            method,
            query,
            path_vars: Vec::new(),
            headers,
            body,
        }
    }

    /// Creates an empty POST request. Useful as a builder seed.
    #[must_use]
    pub fn post(body: impl Into<Bytes>) -> Self {
        Self::new(Method::POST, Vec::new(), HeaderMap::new(), body.into())
    }

    /// Creates an empty GET request. Useful as a builder seed.
    #[must_use]
    pub fn get() -> Self {
        Self::new(Method::GET, Vec::new(), HeaderMap::new(), Bytes::new())
    }

    /// Appends a query parameter.
    #[must_use]
    pub fn with_query(mut self, name: &str, value: &str) -> Self {
        self.query.push((name.to_string(), value.to_string()));
        self
    }

    /// Appends a path/route variable.
    #[must_use]
    pub fn with_path_var(mut self, name: &str, value: &str) -> Self {
        self.path_vars.push((name.to_string(), value.to_string()));
        self
    }

    /// Sets a header.
    ///
    /// # Panics
    ///
    /// Panics when `name` or `value` is not a valid HTTP header token; use
    /// [`FunctionRequest::new`] with a prebuilt `HeaderMap` for dynamic
    /// values.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        let name: http::HeaderName = name.parse().expect("valid header name");
        let value: http::HeaderValue = value.parse().expect("valid header value");
        self.headers.insert(name, value);
        self
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    /// Returns the first query parameter with the given name.
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    #[must_use]
    pub fn path_vars(&self) -> &[(String, String)] {
        &self.path_vars
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns a header value as UTF-8 text.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Returns the buffered body. The same bytes are visible to every
    /// reader, however many times they are read.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Extracts the correlation id: query parameter first, then the header
    /// of the same name. Absent ids yield an empty string; the caller
    /// decides whether to generate one.
    #[must_use]
    pub fn correlation_id(&self) -> String {
        self.query_param(CORRELATION_ID)
            .or_else(|| self.header(CORRELATION_ID))
            .unwrap_or_default()
            .to_string()
    }

    /// Extracts the command name: query parameter `cmd` first, then a `cmd`
    /// field in the JSON body. An empty or absent command yields an empty
    /// string.
    ///
    /// # Errors
    ///
    /// Returns `INVALID_JSON` when the body is non-empty and not valid JSON
    /// -- a malformed payload is a distinct failure, not "no command".
    pub fn command(&self) -> Result<String, ApplicationError> {
        if let Some(command) = self.query_param(COMMAND) {
            if !command.is_empty() {
                return Ok(command.to_string());
            }
        }

        if self.body_is_blank() {
            return Ok(String::new());
        }

        let value: Value = serde_json::from_slice(&self.body).map_err(|err| {
            ApplicationError::bad_request(
                &self.correlation_id(),
                codes::INVALID_JSON,
                "Invalid json format",
            )
            .with_cause(err)
        })?;

        Ok(value
            .get(COMMAND)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    /// Decodes the buffered body into `T` without consuming it.
    ///
    /// # Errors
    ///
    /// Returns `INVALID_JSON` when the body does not decode into `T`.
    pub fn decode_body<T: DeserializeOwned>(&self) -> Result<T, ApplicationError> {
        serde_json::from_slice(&self.body).map_err(|err| {
            ApplicationError::bad_request(
                &self.correlation_id(),
                codes::INVALID_JSON,
                "Invalid json format",
            )
            .with_cause(err)
        })
    }

    /// Returns the body as a JSON value, or `None` when the body is blank
    /// or not valid JSON. Lenient on purpose: validation materializes the
    /// body as `null` rather than failing twice.
    #[must_use]
    pub fn body_json(&self) -> Option<Value> {
        if self.body_is_blank() {
            return None;
        }
        serde_json::from_slice(&self.body).ok()
    }

    /// Returns the body as a parameter map, empty when the body is absent
    /// or not a JSON object.
    #[must_use]
    pub fn parameters(&self) -> Parameters {
        Parameters::from_value(self.body_json().unwrap_or(Value::Null))
    }

    fn body_is_blank(&self) -> bool {
        self.body.iter().all(u8::is_ascii_whitespace)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
