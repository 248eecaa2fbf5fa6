//! Action registration and the wrapping pipeline.
//!
//! A [`FunctionService`] is the per-service registry: named actions with
//! optional validation schemas, plus an ordered interceptor chain. At
//! registration time each action is wrapped as
//! `panic guard ( interceptors ( validation ( action ) ) )` and stored under
//! its generated command key; the gateway later merges every service's
//! actions into the dispatch map.

pub mod action;
pub mod commandable;
pub mod function_service;

pub use action::{action, interceptor, ActionFn, BoxFuture, FunctionAction, InterceptorFn, Next};
pub use commandable::{Command, Commandable};
pub use function_service::{FunctionService, Registrar, SetupError};
