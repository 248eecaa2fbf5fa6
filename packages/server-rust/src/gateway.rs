//! The function gateway: container aggregation and the dispatcher.
//!
//! A [`FunctionGateway`] collects services, merges their registered actions
//! into one `command -> handler` map, and executes inbound requests against
//! it. The merge happens lazily on the first request (the serverless "cold
//! start"): an open-once guard makes concurrent first requests pay the setup
//! cost exactly once, and no request is dropped while setup runs.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, info_span, Instrument};

use funcgate_core::{codes, ApplicationError};

use crate::request::FunctionRequest;
use crate::response::{send_error, ActionResponse};
use crate::service::{ActionFn, FunctionService, SetupError};

/// Aggregates services and dispatches commands to their actions.
///
/// Services are added during the setup phase; the dispatch map is built once
/// and read-only afterwards, so steady-state lookups take no locks.
/// Duplicate command keys across distinct services are not rejected here --
/// uniqueness is a registration-time concern within each service -- the last
/// added service wins.
pub struct FunctionGateway {
    name: String,
    description: String,
    services: Mutex<Vec<FunctionService>>,
    actions: OnceCell<HashMap<String, ActionFn>>,
}

impl FunctionGateway {
    #[must_use]
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            services: Mutex::new(Vec::new()),
            actions: OnceCell::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Adds a service to the container. Must happen before the first
    /// request; services added after the gateway opened are ignored.
    pub fn add_service(&self, service: FunctionService) {
        self.services.lock().push(service);
    }

    /// Whether one-time setup has completed.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.actions.initialized()
    }

    /// Runs one-time setup: opens every service (running registrars) and
    /// builds the flat dispatch map. Idempotent and race-free -- concurrent
    /// callers all wait for a single initialization.
    ///
    /// # Errors
    ///
    /// Propagates the first service's [`SetupError`]; a failed setup leaves
    /// the gateway closed so a later call can retry.
    pub async fn open(&self) -> Result<(), SetupError> {
        self.actions
            .get_or_try_init(|| async {
                let mut services = self.services.lock();
                let mut map = HashMap::new();
                for service in services.iter_mut() {
                    service.open()?;
                    for act in service.actions() {
                        map.insert(act.command.clone(), Arc::clone(&act.handler));
                    }
                }
                info!(
                    gateway = %self.name,
                    services = services.len(),
                    actions = map.len(),
                    "gateway opened"
                );
                Ok(map)
            })
            .await
            .map(|_| ())
    }

    /// Commands the gateway can currently dispatch, unordered. Empty before
    /// the gateway opens.
    #[must_use]
    pub fn commands(&self) -> Vec<String> {
        self.actions
            .get()
            .map(|map| map.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Dispatches one request: extract the command, resolve the action, run
    /// its handler chain. Routing failures answer with structured
    /// bad-request documents and never reach a handler.
    pub async fn execute(&self, request: FunctionRequest) -> ActionResponse {
        // Cold start: complete setup synchronously before the first dispatch.
        if let Err(err) = self.open().await {
            error!(gateway = %self.name, error = %err, "gateway setup failed");
            return send_error(
                &ApplicationError::internal("", codes::INTERNAL, "Gateway setup failed")
                    .with_cause(err),
            );
        }

        let correlation_id = request.correlation_id();

        let command = match request.command() {
            Ok(command) => command,
            Err(_) => {
                return send_error(&ApplicationError::bad_request(
                    &correlation_id,
                    codes::INVALID_JSON,
                    "Invalid json format",
                ));
            }
        };

        if command.is_empty() {
            return send_error(&ApplicationError::bad_request(
                &correlation_id,
                codes::NO_COMMAND,
                "Cmd parameter is missing",
            ));
        }

        let Some(handler) = self
            .actions
            .get()
            .and_then(|map| map.get(&command))
            .map(Arc::clone)
        else {
            return send_error(&ApplicationError::bad_request(
                &correlation_id,
                codes::NO_ACTION,
                &format!("Action {command} was not found"),
            ));
        };

        let span = info_span!("action", command = %command, correlation_id = %correlation_id);
        metrics::counter!(format!("{command}.exec_count")).increment(1);
        let start = Instant::now();

        let response = handler(request).instrument(span).await;

        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        metrics::histogram!(format!("{command}.exec_time")).record(elapsed_ms);
        debug!(
            command = %command,
            correlation_id = %correlation_id,
            status = %response.status(),
            elapsed_ms,
            "action executed"
        );
        response
    }
}

impl std::fmt::Debug for FunctionGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionGateway")
            .field("name", &self.name)
            .field("opened", &self.is_open())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
