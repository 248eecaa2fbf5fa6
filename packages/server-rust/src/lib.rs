//! `funcgate` Server -- a single-endpoint action gateway.
//!
//! One physical HTTP entry point routes to many logical operations based on
//! a payload-embedded command name:
//!
//! 1. **Extraction** (`request`): correlation id + command from query,
//!    header, or JSON body
//! 2. **Validation** (`service`): optional per-action parameter schemas
//! 3. **Interceptors** (`service`): ordered middleware chain with per-command
//!    match patterns
//! 4. **Dispatch** (`gateway`): command lookup across registered services,
//!    cold-start setup on first request
//! 5. **Transport** (`network`): axum wiring with tower-http middleware

pub mod gateway;
pub mod network;
pub mod request;
pub mod response;
pub mod service;

pub use gateway::FunctionGateway;
pub use request::FunctionRequest;
pub use response::{
    send_created_result, send_deleted_result, send_empty_result, send_error, send_result,
    ActionResponse,
};
pub use service::{
    action, interceptor, ActionFn, Command, Commandable, FunctionAction, FunctionService,
    InterceptorFn, Next, Registrar, SetupError,
};
