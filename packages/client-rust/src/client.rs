//! The resilient invocation client.
//!
//! Calls a function gateway from the outside: one POST per attempt, bounded
//! retries with quadratic backoff on transport failure, cancellable waits,
//! and typed classification of the terminal response.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, warn, Instrument};

use funcgate_core::{codes, short_id, ApplicationError, Parameters};

use crate::classify::{classify_response, InvocationOutcome};
use crate::connect::ConnectionResolver;

/// Default number of attempts per call.
pub const DEFAULT_RETRIES: u32 = 3;
/// Default connection timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(10_000);
/// Default invocation timeout.
pub const DEFAULT_INVOKE_TIMEOUT: Duration = Duration::from_millis(10_000);

// ---------------------------------------------------------------------------
// ClientConfig
// ---------------------------------------------------------------------------

/// Invocation client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Number of attempts before a transport failure is terminal.
    pub retries: u32,
    /// Connection setup timeout.
    pub connect_timeout: Duration,
    /// Invocation timeout; also scales the retry backoff.
    pub invoke_timeout: Duration,
    /// Headers added to every request.
    pub headers: Vec<(String, String)>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            retries: DEFAULT_RETRIES,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            invoke_timeout: DEFAULT_INVOKE_TIMEOUT,
            headers: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// FunctionClient
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct OpenState {
    http: reqwest::Client,
    uri: String,
}

/// Outbound client for a single function endpoint.
///
/// Lifecycle: construct, `open` (resolves the URI and builds the HTTP
/// client), `call` any number of times, `close`. Calls on a closed client
/// are deliberate no-ops -- callers check `is_open` explicitly.
pub struct FunctionClient {
    config: ClientConfig,
    resolver: Arc<dyn ConnectionResolver>,
    state: RwLock<Option<OpenState>>,
}

impl FunctionClient {
    #[must_use]
    pub fn new(config: ClientConfig, resolver: Arc<dyn ConnectionResolver>) -> Self {
        Self {
            config,
            resolver,
            state: RwLock::new(None),
        }
    }

    /// Whether the client has been opened.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state.read().is_some()
    }

    /// The resolved endpoint URI, once open.
    #[must_use]
    pub fn uri(&self) -> Option<String> {
        self.state.read().as_ref().map(|state| state.uri.clone())
    }

    /// Opens the client: resolves the endpoint and builds the HTTP client.
    /// Idempotent.
    ///
    /// The transport timeout covers the whole round trip -- connection
    /// setup, any redirects, and the full body read -- so it is the sum of
    /// the two configured timeouts.
    ///
    /// # Errors
    ///
    /// Propagates resolver failures and rejects malformed default headers;
    /// both are configuration problems surfaced at activation time.
    pub async fn open(&self, correlation_id: &str) -> Result<(), ApplicationError> {
        if self.is_open() {
            return Ok(());
        }

        let uri = self.resolver.resolve(correlation_id).await?;
        let headers = build_header_map(correlation_id, &self.config.headers)?;

        let http = reqwest::Client::builder()
            .connect_timeout(self.config.connect_timeout)
            .timeout(self.config.connect_timeout + self.config.invoke_timeout)
            .default_headers(headers)
            .build()
            .map_err(|err| {
                ApplicationError::internal(
                    correlation_id,
                    "CANNOT_CONNECT",
                    "Failed to build HTTP client",
                )
                .with_cause(err)
            })?;

        debug!(correlation_id, uri = %uri, "function client connected");
        *self.state.write() = Some(OpenState { http, uri });
        Ok(())
    }

    /// Closes the client and frees the connection pool. Idempotent.
    pub fn close(&self, correlation_id: &str) {
        if self.state.write().take().is_some() {
            debug!(correlation_id, "function client closed");
        }
    }

    /// Invokes a command with the given arguments.
    ///
    /// Returns `None` when the client is not open -- a deliberate no-op, not
    /// a failure. Otherwise returns exactly one terminal
    /// [`InvocationOutcome`]. See [`call_cancellable`](Self::call_cancellable)
    /// for aborting retries early.
    pub async fn call(
        &self,
        cmd: &str,
        correlation_id: &str,
        args: Parameters,
    ) -> Option<InvocationOutcome> {
        self.call_cancellable(cmd, correlation_id, args, &CancellationToken::new())
            .await
    }

    /// [`call`](Self::call) with an external cancellation signal.
    ///
    /// The retry backoff is the only suspension point that honors `cancel`:
    /// a cancellation during the wait aborts immediately with a
    /// `CONTEXT_CANCELLED` transport failure instead of retrying further.
    pub async fn call_cancellable(
        &self,
        cmd: &str,
        correlation_id: &str,
        args: Parameters,
        cancel: &CancellationToken,
    ) -> Option<InvocationOutcome> {
        let state = self.state.read().clone()?;

        if cmd.is_empty() {
            return Some(InvocationOutcome::StructuredError(
                ApplicationError::bad_request(correlation_id, codes::NO_COMMAND, "Missing command"),
            ));
        }

        let correlation_id = if correlation_id.is_empty() {
            short_id()
        } else {
            correlation_id.to_string()
        };

        let mut args = args;
        args.put("cmd", cmd);
        args.put("correlation_id", correlation_id.as_str());
        let body = match serde_json::to_vec(&args) {
            Ok(body) => body,
            Err(err) => {
                return Some(InvocationOutcome::TransportFailure(
                    ApplicationError::internal(
                        &correlation_id,
                        codes::INVALID_JSON,
                        "Failed to serialize call arguments",
                    )
                    .with_cause(err),
                ));
            }
        };

        let span = info_span!("call", command = %cmd, correlation_id = %correlation_id);
        metrics::counter!(format!("{cmd}.call_count")).increment(1);
        let start = Instant::now();

        let outcome = self
            .send_with_retries(&state, &correlation_id, body, cancel)
            .instrument(span)
            .await;

        metrics::histogram!(format!("{cmd}.call_time"))
            .record(start.elapsed().as_secs_f64() * 1000.0);
        Some(outcome)
    }

    /// Invokes a command and decodes the payload, collapsing the outcome
    /// into a conventional result. `Ok(None)` covers both "no content" and
    /// "client not open".
    ///
    /// # Errors
    ///
    /// Returns structured remote errors, transport failures, and payload
    /// decode failures.
    pub async fn call_json<T: serde::de::DeserializeOwned>(
        &self,
        cmd: &str,
        correlation_id: &str,
        args: Parameters,
    ) -> Result<Option<T>, ApplicationError> {
        match self.call(cmd, correlation_id, args).await {
            None => Ok(None),
            Some(outcome) => match outcome.into_result()? {
                None => Ok(None),
                Some(payload) => payload.json(correlation_id).map(Some),
            },
        }
    }

    async fn send_with_retries(
        &self,
        state: &OpenState,
        correlation_id: &str,
        body: Vec<u8>,
        cancel: &CancellationToken,
    ) -> InvocationOutcome {
        let mut remaining = self.config.retries.max(1);

        let response = loop {
            let attempt = self
                .config
                .retries
                .max(1)
                .saturating_sub(remaining)
                .saturating_add(1);

            let result = state
                .http
                .post(&state.uri)
                .header(CONTENT_TYPE, "application/json")
                .body(body.clone())
                .send()
                .await;

            match result {
                Ok(response) => break response,
                Err(err) => {
                    remaining -= 1;
                    if remaining == 0 {
                        warn!(correlation_id, attempt, error = %err, "transport failed, budget exhausted");
                        return InvocationOutcome::TransportFailure(
                            ApplicationError::internal(
                                correlation_id,
                                codes::COMMUNICATION_ERROR,
                                "Unknown communication problem on invocation client",
                            )
                            .with_cause(err),
                        );
                    }

                    // Quadratic backoff keyed to the attempts already
                    // consumed: invoke_timeout * used^2.
                    let used = self.config.retries.max(1) - remaining;
                    let wait = self.config.invoke_timeout * used * used;
                    debug!(correlation_id, attempt, wait_ms = wait.as_millis() as u64, error = %err, "transport failed, retrying");

                    tokio::select! {
                        () = cancel.cancelled() => {
                            return InvocationOutcome::TransportFailure(ApplicationError::internal(
                                correlation_id,
                                codes::CONTEXT_CANCELLED,
                                "Request cancelled by caller",
                            ));
                        }
                        () = tokio::time::sleep(wait) => {}
                    }
                }
            }
        };

        classify_response(response, correlation_id).await
    }
}

impl std::fmt::Debug for FunctionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionClient")
            .field("opened", &self.is_open())
            .field("retries", &self.config.retries)
            .finish_non_exhaustive()
    }
}

fn build_header_map(
    correlation_id: &str,
    headers: &[(String, String)],
) -> Result<HeaderMap, ApplicationError> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let name = HeaderName::try_from(name.as_str()).map_err(|err| {
            ApplicationError::internal(correlation_id, "BAD_HEADER", "Invalid default header name")
                .with_cause(err)
        })?;
        let value = HeaderValue::try_from(value.as_str()).map_err(|err| {
            ApplicationError::internal(correlation_id, "BAD_HEADER", "Invalid default header value")
                .with_cause(err)
        })?;
        map.insert(name, value);
    }
    Ok(map)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::extract::Json;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::Router;
    use parking_lot::Mutex;
    use serde_json::{json, Value};
    use tokio::io::AsyncReadExt;

    use crate::connect::StaticConnectionResolver;

    use super::*;

    async fn spawn_server(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/")
    }

    async fn open_client(uri: &str, config: ClientConfig) -> FunctionClient {
        let client = FunctionClient::new(config, Arc::new(StaticConnectionResolver::new(uri)));
        client.open("test").await.unwrap();
        client
    }

    fn fast_config() -> ClientConfig {
        ClientConfig {
            retries: 3,
            connect_timeout: Duration::from_millis(1_000),
            invoke_timeout: Duration::from_millis(100),
            ..ClientConfig::default()
        }
    }

    #[tokio::test]
    async fn closed_client_call_is_a_noop() {
        let client = FunctionClient::new(
            ClientConfig::default(),
            Arc::new(StaticConnectionResolver::new("http://localhost:1/")),
        );
        assert!(!client.is_open());
        let outcome = client.call("get_x", "c1", Parameters::new()).await;
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn empty_command_reports_no_command() {
        let uri = spawn_server(Router::new()).await;
        let client = open_client(&uri, ClientConfig::default()).await;

        match client.call("", "c1", Parameters::new()).await {
            Some(InvocationOutcome::StructuredError(err)) => {
                assert_eq!(err.code, codes::NO_COMMAND);
            }
            other => panic!("expected NO_COMMAND, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn injects_cmd_and_correlation_id_into_body() {
        let seen: Arc<Mutex<Option<Value>>> = Arc::new(Mutex::new(None));
        let seen_in_handler = Arc::clone(&seen);
        let router = Router::new().route(
            "/",
            post(move |Json(body): Json<Value>| {
                let seen = Arc::clone(&seen_in_handler);
                async move {
                    *seen.lock() = Some(body);
                    StatusCode::NO_CONTENT
                }
            }),
        );
        let uri = spawn_server(router).await;
        let client = open_client(&uri, ClientConfig::default()).await;

        let args = Parameters::new().with("dummy_id", "42");
        let outcome = client.call("dummies.get", "corr-7", args).await.unwrap();
        assert!(matches!(outcome, InvocationOutcome::NoContent));

        let body = seen.lock().clone().unwrap();
        assert_eq!(body["dummy_id"], "42");
        assert_eq!(body["cmd"], "dummies.get");
        assert_eq!(body["correlation_id"], "corr-7");
    }

    #[tokio::test]
    async fn generates_short_correlation_id_when_absent() {
        let seen: Arc<Mutex<Option<Value>>> = Arc::new(Mutex::new(None));
        let seen_in_handler = Arc::clone(&seen);
        let router = Router::new().route(
            "/",
            post(move |Json(body): Json<Value>| {
                let seen = Arc::clone(&seen_in_handler);
                async move {
                    *seen.lock() = Some(body);
                    StatusCode::NO_CONTENT
                }
            }),
        );
        let uri = spawn_server(router).await;
        let client = open_client(&uri, ClientConfig::default()).await;

        client.call("op", "", Parameters::new()).await.unwrap();

        let body = seen.lock().clone().unwrap();
        let generated = body["correlation_id"].as_str().unwrap();
        assert_eq!(generated.len(), 16);
    }

    #[tokio::test]
    async fn success_payload_is_returned() {
        let router = Router::new().route(
            "/",
            post(|| async { Json(json!({"id": "42", "key": "k"})) }),
        );
        let uri = spawn_server(router).await;
        let client = open_client(&uri, ClientConfig::default()).await;

        match client.call("dummies.get", "c1", Parameters::new()).await {
            Some(InvocationOutcome::Success(payload)) => {
                assert_eq!(payload.status, 200);
                let value: Value = payload.json("c1").unwrap();
                assert_eq!(value["id"], "42");
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn structured_404_passes_through() {
        let router = Router::new().route(
            "/",
            post(|| async {
                (
                    StatusCode::NOT_FOUND,
                    Json(json!({"status": 404, "code": "NOT_FOUND", "message": "missing"})),
                )
            }),
        );
        let uri = spawn_server(router).await;
        let client = open_client(&uri, ClientConfig::default()).await;

        match client.call("op", "c1", Parameters::new()).await {
            Some(InvocationOutcome::StructuredError(err)) => {
                assert_eq!(err.status, 404);
                assert_eq!(err.code, "NOT_FOUND");
                assert_eq!(err.message, "missing");
            }
            other => panic!("expected structured error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn plain_text_404_preserves_raw_body() {
        let router = Router::new()
            .route("/", post(|| async { (StatusCode::NOT_FOUND, "plain text") }));
        let uri = spawn_server(router).await;
        let client = open_client(&uri, ClientConfig::default()).await;

        match client.call("op", "c1", Parameters::new()).await {
            Some(InvocationOutcome::StructuredError(err)) => {
                assert_eq!(err.status, 404);
                assert_eq!(err.code, "");
                assert_eq!(err.message, "plain text");
            }
            other => panic!("expected structured error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn call_json_decodes_payload() {
        let router = Router::new().route("/", post(|| async { Json(json!({"id": "7"})) }));
        let uri = spawn_server(router).await;
        let client = open_client(&uri, ClientConfig::default()).await;

        let value: Option<Value> = client.call_json("op", "c1", Parameters::new()).await.unwrap();
        assert_eq!(value.unwrap()["id"], "7");
    }

    #[tokio::test]
    async fn retries_three_times_with_quadratic_backoff() {
        // A listener that accepts and immediately severs each connection:
        // every attempt is a transport failure with an observable timestamp.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepts: Arc<Mutex<Vec<Instant>>> = Arc::new(Mutex::new(Vec::new()));
        let accepts_in_server = Arc::clone(&accepts);
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                accepts_in_server.lock().push(Instant::now());
                // Read a little so the client finishes writing, then drop.
                let mut buf = [0_u8; 64];
                let _ = socket.read(&mut buf).await;
                drop(socket);
            }
        });

        let client = open_client(&format!("http://{addr}/"), fast_config()).await;
        let outcome = client.call("op", "c1", Parameters::new()).await.unwrap();

        match outcome {
            InvocationOutcome::TransportFailure(err) => {
                assert_eq!(err.code, codes::COMMUNICATION_ERROR);
                assert!(err.cause.is_some());
            }
            other => panic!("expected transport failure, got {other:?}"),
        }

        let times = accepts.lock().clone();
        assert_eq!(times.len(), 3, "exactly 3 attempts expected");

        // Backoff between attempts: ~100ms (1^2) then ~400ms (2^2).
        let first_gap = times[1].duration_since(times[0]);
        let second_gap = times[2].duration_since(times[1]);
        assert!(first_gap >= Duration::from_millis(95), "first gap {first_gap:?}");
        assert!(first_gap < Duration::from_millis(350), "first gap {first_gap:?}");
        assert!(second_gap >= Duration::from_millis(380), "second gap {second_gap:?}");
        assert!(second_gap < Duration::from_millis(1_000), "second gap {second_gap:?}");
    }

    #[tokio::test]
    async fn cancellation_during_backoff_aborts_immediately() {
        // Bind then drop to get a port that refuses connections.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = ClientConfig {
            retries: 3,
            connect_timeout: Duration::from_millis(1_000),
            invoke_timeout: Duration::from_millis(5_000),
            ..ClientConfig::default()
        };
        let client = open_client(&format!("http://{addr}/"), config).await;

        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            canceller.cancel();
        });

        let start = Instant::now();
        let outcome = client
            .call_cancellable("op", "c1", Parameters::new(), &cancel)
            .await
            .unwrap();

        match outcome {
            InvocationOutcome::TransportFailure(err) => {
                assert_eq!(err.code, codes::CONTEXT_CANCELLED);
            }
            other => panic!("expected cancellation, got {other:?}"),
        }
        // Aborted during the first 5s backoff window, not after it.
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn open_is_idempotent_and_close_clears() {
        let uri = spawn_server(Router::new()).await;
        let client = open_client(&uri, ClientConfig::default()).await;

        let uri_before = client.uri().unwrap();
        client.open("again").await.unwrap();
        assert_eq!(client.uri().unwrap(), uri_before);

        client.close("done");
        assert!(!client.is_open());
        client.close("done again");
    }
}
