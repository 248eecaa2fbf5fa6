//! Action and interceptor function types.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use funcgate_core::Validator;

use crate::request::FunctionRequest;
use crate::response::ActionResponse;

/// Boxed future used throughout the dispatch pipeline.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// A callable action: one inbound request in, one response out.
pub type ActionFn = Arc<dyn Fn(FunctionRequest) -> BoxFuture<ActionResponse> + Send + Sync>;

/// A middleware-like function receiving the request and a [`Next`]
/// continuation into the rest of the chain.
pub type InterceptorFn =
    Arc<dyn Fn(FunctionRequest, Next) -> BoxFuture<ActionResponse> + Send + Sync>;

/// Wraps an async closure into an [`ActionFn`].
pub fn action<F, Fut>(f: F) -> ActionFn
where
    F: Fn(FunctionRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ActionResponse> + Send + 'static,
{
    Arc::new(move |request| Box::pin(f(request)))
}

/// Wraps an async closure into an [`InterceptorFn`].
pub fn interceptor<F, Fut>(f: F) -> InterceptorFn
where
    F: Fn(FunctionRequest, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ActionResponse> + Send + 'static,
{
    Arc::new(move |request, next| Box::pin(f(request, next)))
}

// ---------------------------------------------------------------------------
// Next
// ---------------------------------------------------------------------------

/// Continuation into the remainder of an interceptor chain.
///
/// An interceptor either produces a response itself (short-circuit) or
/// forwards the request with `next.run(request)`.
#[derive(Clone)]
pub struct Next {
    inner: ActionFn,
}

impl Next {
    pub(crate) fn new(inner: ActionFn) -> Self {
        Self { inner }
    }

    /// Invokes the rest of the chain.
    pub async fn run(self, request: FunctionRequest) -> ActionResponse {
        (self.inner)(request).await
    }
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// FunctionAction
// ---------------------------------------------------------------------------

/// A registered action: the generated command key, the optional validation
/// schema it was registered with, and the fully wrapped handler chain.
///
/// Immutable after registration.
#[derive(Clone)]
pub struct FunctionAction {
    /// Command key, unique within the owning service's registry.
    pub command: String,
    /// Schema the action was registered with, if any.
    pub schema: Option<Arc<dyn Validator>>,
    /// The stored handler: panic guard, interceptors, and validation
    /// already applied.
    pub handler: ActionFn,
}

impl fmt::Debug for FunctionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionAction")
            .field("command", &self.command)
            .field("has_schema", &self.schema.is_some())
            .finish_non_exhaustive()
    }
}
