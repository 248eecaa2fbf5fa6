//! The per-service action registry and wrapping pipeline.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, error};

use funcgate_core::{codes, ApplicationError, Validator};

use super::action::{ActionFn, FunctionAction, InterceptorFn, Next};
use crate::request::FunctionRequest;
use crate::response::send_error;

// ---------------------------------------------------------------------------
// SetupError
// ---------------------------------------------------------------------------

/// Fatal configuration errors raised while a service registers its actions.
///
/// These surface at service activation time and never enter the per-request
/// error path: a service that fails to register does not serve traffic.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("action name must not be empty")]
    EmptyActionName,
    #[error("action already registered: {command}")]
    DuplicateAction { command: String },
    #[error("invalid interceptor pattern {pattern:?}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: Box<regex::Error>,
    },
}

// ---------------------------------------------------------------------------
// Registrar
// ---------------------------------------------------------------------------

/// Capability that populates a service's registry.
///
/// Implementors register actions and interceptors when the service is
/// opened. This replaces override-style subclassing: the orchestration is
/// fixed, only the registration step is pluggable.
pub trait Registrar: Send + Sync {
    /// Registers this component's actions on the given service.
    ///
    /// # Errors
    ///
    /// Returns a [`SetupError`] on fatal misconfiguration (duplicate or
    /// empty action names, malformed interceptor patterns).
    fn register(&self, service: &mut FunctionService) -> Result<(), SetupError>;
}

// ---------------------------------------------------------------------------
// FunctionService
// ---------------------------------------------------------------------------

struct Interceptor {
    /// `None` matches every command.
    pattern: Option<Regex>,
    handler: InterceptorFn,
}

/// Registry of actions and interceptors for one logical service.
///
/// Lifecycle: populate (directly or through a [`Registrar`]) during the
/// single-threaded setup phase, then hand to the gateway. The registry is
/// read-only once traffic flows; `close` tears it down.
pub struct FunctionService {
    name: String,
    actions: Vec<FunctionAction>,
    interceptors: Vec<Interceptor>,
    registrar: Option<Arc<dyn Registrar>>,
    opened: bool,
}

impl FunctionService {
    /// Creates a service. `name` prefixes every generated command key;
    /// pass `""` for unprefixed keys.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            actions: Vec::new(),
            interceptors: Vec::new(),
            registrar: None,
            opened: false,
        }
    }

    /// Creates a service whose registry is populated by `registrar` when
    /// the service is opened.
    #[must_use]
    pub fn with_registrar(name: &str, registrar: Arc<dyn Registrar>) -> Self {
        Self {
            registrar: Some(registrar),
            ..Self::new(name)
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Generates the command key for an action name:
    /// `<service>.<name>` when the service has a name, else `<name>`.
    #[must_use]
    pub fn command_for(&self, action_name: &str) -> String {
        if self.name.is_empty() {
            action_name.to_string()
        } else {
            format!("{}.{}", self.name, action_name)
        }
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.opened
    }

    /// Opens the service, running the registrar (if any) exactly once.
    ///
    /// # Errors
    ///
    /// Propagates the registrar's [`SetupError`].
    pub fn open(&mut self) -> Result<(), SetupError> {
        if self.opened {
            return Ok(());
        }
        if let Some(registrar) = self.registrar.clone() {
            registrar.register(self)?;
        }
        self.opened = true;
        debug!(service = %self.name, actions = self.actions.len(), "service opened");
        Ok(())
    }

    /// Closes the service and clears its registry.
    pub fn close(&mut self) {
        self.opened = false;
        self.actions.clear();
        self.interceptors.clear();
    }

    /// All actions registered so far, in registration order.
    #[must_use]
    pub fn actions(&self) -> &[FunctionAction] {
        &self.actions
    }

    /// Registers an action under the generated command key.
    ///
    /// The stored handler is the action wrapped in validation, the
    /// interceptor chain registered so far, and a panic guard -- register
    /// interceptors before the actions they should wrap.
    ///
    /// # Errors
    ///
    /// Fails fast when the name is empty or the key is already taken; both
    /// are configuration errors, not request-time conditions.
    pub fn register_action(
        &mut self,
        name: &str,
        schema: Option<Arc<dyn Validator>>,
        action: ActionFn,
    ) -> Result<(), SetupError> {
        if name.is_empty() {
            return Err(SetupError::EmptyActionName);
        }
        let command = self.command_for(name);
        if self.actions.iter().any(|a| a.command == command) {
            return Err(SetupError::DuplicateAction { command });
        }

        let wrapped = apply_validation(schema.clone(), action);
        let wrapped = self.apply_interceptors(wrapped);
        let handler = guard_panics(command.clone(), wrapped);

        self.actions.push(FunctionAction {
            command,
            schema,
            handler,
        });
        Ok(())
    }

    /// Registers an action with an authorization gate between validation
    /// and the action itself: validation -> authorize -> action. An
    /// unauthorized request is answered by the gate and never reaches the
    /// action.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`register_action`](Self::register_action).
    pub fn register_action_with_auth(
        &mut self,
        name: &str,
        schema: Option<Arc<dyn Validator>>,
        authorize: InterceptorFn,
        action: ActionFn,
    ) -> Result<(), SetupError> {
        let gated: ActionFn = Arc::new(move |request: FunctionRequest| {
            let authorize = Arc::clone(&authorize);
            let next = Next::new(Arc::clone(&action));
            Box::pin(async move { authorize(request, next).await })
        });
        self.register_action(name, schema, gated)
    }

    /// Registers an interceptor for actions registered after this call.
    ///
    /// `pattern` is a regular expression matched against the effective
    /// command of each request; an empty pattern matches every command.
    /// Non-matching requests skip straight to the next link in the chain.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::InvalidPattern`] when the pattern does not
    /// compile.
    pub fn register_interceptor(
        &mut self,
        pattern: &str,
        handler: InterceptorFn,
    ) -> Result<(), SetupError> {
        let pattern = if pattern.is_empty() {
            None
        } else {
            Some(
                Regex::new(pattern).map_err(|source| SetupError::InvalidPattern {
                    pattern: pattern.to_string(),
                    source: Box::new(source),
                })?,
            )
        };
        self.interceptors.push(Interceptor { pattern, handler });
        Ok(())
    }

    /// Wraps `action` in the interceptor chain registered so far.
    ///
    /// Iterates last-registered to first-registered, so the first-registered
    /// interceptor ends up outermost and executes first.
    fn apply_interceptors(&self, action: ActionFn) -> ActionFn {
        let mut wrapped = action;
        for entry in self.interceptors.iter().rev() {
            let pattern = entry.pattern.clone();
            let handler = Arc::clone(&entry.handler);
            let inner = wrapped;
            wrapped = Arc::new(move |request: FunctionRequest| {
                let pattern = pattern.clone();
                let handler = Arc::clone(&handler);
                let next = Next::new(Arc::clone(&inner));
                Box::pin(async move {
                    // Match against the live request: the same interceptor
                    // instance wraps every action, activation is per command.
                    let command = request.command().unwrap_or_default();
                    match pattern {
                        Some(re) if !re.is_match(&command) => next.run(request).await,
                        _ => handler(request, next).await,
                    }
                })
            });
        }
        wrapped
    }
}

impl std::fmt::Debug for FunctionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionService")
            .field("name", &self.name)
            .field("actions", &self.actions.len())
            .field("interceptors", &self.interceptors.len())
            .field("opened", &self.opened)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Wrapping helpers
// ---------------------------------------------------------------------------

/// Wraps an action with schema validation; identity when there is no schema.
///
/// The parameter object merges query parameters, path variables, and the
/// JSON body under a `body` key. On rejection the wrapper answers with the
/// validator's structured error and never invokes the inner action.
fn apply_validation(schema: Option<Arc<dyn Validator>>, action: ActionFn) -> ActionFn {
    let Some(schema) = schema else {
        return action;
    };

    Arc::new(move |request: FunctionRequest| {
        let schema = Arc::clone(&schema);
        let action = Arc::clone(&action);
        Box::pin(async move {
            let correlation_id = request.correlation_id();

            let mut params = serde_json::Map::new();
            for (key, value) in request.query() {
                params.insert(key.clone(), Value::String(value.clone()));
            }
            for (key, value) in request.path_vars() {
                params.insert(key.clone(), Value::String(value.clone()));
            }
            params.insert(
                "body".to_string(),
                request.body_json().unwrap_or(Value::Null),
            );

            if let Err(err) = schema.validate(&correlation_id, &Value::Object(params), false) {
                return send_error(&err);
            }
            action(request).await
        })
    })
}

/// Outermost wrapper: converts a panicking handler chain into a logged 500.
///
/// A single faulty action must not take the dispatch pipeline down.
fn guard_panics(command: String, action: ActionFn) -> ActionFn {
    Arc::new(move |request: FunctionRequest| {
        let action = Arc::clone(&action);
        let command = command.clone();
        Box::pin(async move {
            let correlation_id = request.correlation_id();
            match AssertUnwindSafe(action(request)).catch_unwind().await {
                Ok(response) => response,
                Err(panic) => {
                    let reason = panic_reason(panic.as_ref());
                    error!(
                        command = %command,
                        correlation_id = %correlation_id,
                        reason = %reason,
                        "action handler panicked"
                    );
                    send_error(
                        &ApplicationError::internal(
                            &correlation_id,
                            codes::INTERNAL,
                            "Action failed",
                        )
                        .with_cause(reason),
                    )
                }
            }
        })
    })
}

fn panic_reason(panic: &(dyn std::any::Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
