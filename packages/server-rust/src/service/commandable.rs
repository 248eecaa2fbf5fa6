//! Commandable registration: actions generated from a command set.
//!
//! A controller implementing [`Commandable`] exposes named commands; a
//! service registers each one as an action that decodes the body parameters,
//! executes the command, and sends its result. Three lines of wiring per
//! controller instead of one handler per operation.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use funcgate_core::{ApplicationError, Parameters};

use super::action::{action, BoxFuture};
use super::function_service::{FunctionService, SetupError};
use crate::request::{FunctionRequest, CORRELATION_ID};
use crate::response::send_result;

/// Async command handler: correlation id + decoded parameters in, JSON
/// result out.
pub type CommandFn =
    Arc<dyn Fn(String, Parameters) -> BoxFuture<Result<Value, ApplicationError>> + Send + Sync>;

/// A named remote-callable command.
#[derive(Clone)]
pub struct Command {
    pub name: String,
    pub handler: CommandFn,
}

impl Command {
    /// Wraps an async closure into a command.
    pub fn new<F, Fut>(name: &str, f: F) -> Self
    where
        F: Fn(String, Parameters) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ApplicationError>> + Send + 'static,
    {
        Self {
            name: name.to_string(),
            handler: Arc::new(move |correlation_id, params| Box::pin(f(correlation_id, params))),
        }
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command").field("name", &self.name).finish_non_exhaustive()
    }
}

/// A controller whose operations are exposed as a command set.
pub trait Commandable: Send + Sync {
    /// The commands this controller supports.
    fn commands(&self) -> Vec<Command>;
}

impl FunctionService {
    /// Registers every command of `controller` as an action.
    ///
    /// The generated action decodes the request body as the parameter map,
    /// strips the injected `correlation_id` entry, executes the command, and
    /// sends the result (`null` results answer as 404, matching
    /// [`send_result`]).
    ///
    /// # Errors
    ///
    /// Propagates registration failures (duplicate or empty command names).
    pub fn register_commandable(&mut self, controller: &dyn Commandable) -> Result<(), SetupError> {
        for command in controller.commands() {
            let handler = Arc::clone(&command.handler);
            let command_name = command.name.clone();
            self.register_action(
                &command.name,
                None,
                action(move |request: FunctionRequest| {
                    let handler = Arc::clone(&handler);
                    let command_name = command_name.clone();
                    async move {
                        let correlation_id = request.correlation_id();
                        let mut args = request.parameters();
                        args.remove(CORRELATION_ID);

                        debug!(command = %command_name, correlation_id = %correlation_id, "executing command");
                        let result = handler(correlation_id.clone(), args).await;
                        send_result(
                            &correlation_id,
                            result.map(|value| if value.is_null() { None } else { Some(value) }),
                        )
                    }
                }),
            )?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use http::StatusCode;
    use serde_json::json;

    use super::*;

    struct EchoController;

    impl Commandable for EchoController {
        fn commands(&self) -> Vec<Command> {
            vec![
                Command::new("echo", |correlation_id, params| async move {
                    Ok(json!({
                        "correlation_id": correlation_id,
                        "params": Value::from(params),
                    }))
                }),
                Command::new("vanish", |_correlation_id, _params| async move {
                    Ok(Value::Null)
                }),
                Command::new("fail", |correlation_id, _params| async move {
                    Err(ApplicationError::bad_request(&correlation_id, "ECHO_FAILED", "nope"))
                }),
            ]
        }
    }

    async fn run(service: &FunctionService, command: &str, request: FunctionRequest) -> crate::response::ActionResponse {
        let act = service
            .actions()
            .iter()
            .find(|a| a.command == command)
            .expect("action registered");
        (act.handler)(request).await
    }

    #[test]
    fn registers_one_action_per_command() {
        let mut service = FunctionService::new("things");
        service.register_commandable(&EchoController).unwrap();

        let commands: Vec<_> = service.actions().iter().map(|a| a.command.clone()).collect();
        assert_eq!(commands, vec!["things.echo", "things.vanish", "things.fail"]);
    }

    #[tokio::test]
    async fn command_receives_body_params_without_correlation_id() {
        let mut service = FunctionService::new("things");
        service.register_commandable(&EchoController).unwrap();

        let request =
            FunctionRequest::post(r#"{"cmd":"things.echo","correlation_id":"c3","key":"k1"}"#);
        let response = run(&service, "things.echo", request).await;

        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = response.decode_json().unwrap();
        assert_eq!(body["correlation_id"], "c3");
        assert_eq!(body["params"]["key"], "k1");
        // The injected correlation_id entry is stripped from the params.
        assert!(body["params"].get("correlation_id").is_none());
        // The cmd entry stays: actions that care can read it.
        assert_eq!(body["params"]["cmd"], "things.echo");
    }

    #[tokio::test]
    async fn null_result_answers_not_found() {
        let mut service = FunctionService::new("things");
        service.register_commandable(&EchoController).unwrap();

        let response = run(&service, "things.vanish", FunctionRequest::post("{}")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn command_error_becomes_error_document() {
        let mut service = FunctionService::new("things");
        service.register_commandable(&EchoController).unwrap();

        let response = run(&service, "things.fail", FunctionRequest::post("{}")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let err: ApplicationError = response.decode_json().unwrap();
        assert_eq!(err.code, "ECHO_FAILED");
    }

    #[test]
    fn duplicate_command_names_fail_registration() {
        struct Dup;
        impl Commandable for Dup {
            fn commands(&self) -> Vec<Command> {
                vec![
                    Command::new("same", |_c, _p| async move { Ok(Value::Null) }),
                    Command::new("same", |_c, _p| async move { Ok(Value::Null) }),
                ]
            }
        }

        let mut service = FunctionService::new("things");
        let err = service.register_commandable(&Dup).unwrap_err();
        assert!(matches!(err, SetupError::DuplicateAction { .. }));
    }
}
