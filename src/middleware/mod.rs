//! Request interceptors that run before routing.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → chain.rs (one axum layer, interceptors in install order)
//!         → dev.rs (built asset under the public path? respond)
//!         → hot.rs (event stream path? respond with SSE)
//!     → host routes
//!     → catch-all render (when a server target exists)
//! ```
//!
//! # Design Decisions
//! - Interceptors are callback style: each gets a [`Done`] handle it must fire
//! - `Done` is consumed when fired, so completion happens at most once
//! - A dropped `Done` fails the request instead of hanging it

pub mod chain;
pub mod dev;
pub mod hot;

use axum::http::{HeaderMap, Method, Request, Uri, Version};
use axum::response::Response;
use tokio::sync::oneshot;

use crate::error::BoxError;

pub use chain::InterceptorChain;
pub use dev::DevMiddleware;
pub use hot::HotMiddleware;

/// The parts of an inbound request an interceptor may inspect.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: Method,
    pub uri: Uri,
    pub version: Version,
    pub headers: HeaderMap,
}

impl RequestContext {
    pub fn from_request<B>(request: &Request<B>) -> Self {
        Self {
            method: request.method().clone(),
            uri: request.uri().clone(),
            version: request.version(),
            headers: request.headers().clone(),
        }
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }
}

/// How an interceptor finished with a request.
#[derive(Debug)]
pub enum Outcome {
    /// Hand the request to the next interceptor, then the router.
    Continue,
    /// Answer the request; nothing after this interceptor runs.
    Respond(Response),
}

pub(crate) type Completion = Result<Outcome, BoxError>;

/// Single-use completion handle given to [`Middleware::call`].
#[derive(Debug)]
pub struct Done {
    tx: oneshot::Sender<Completion>,
}

impl Done {
    pub(crate) fn channel() -> (Self, oneshot::Receiver<Completion>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    pub fn next(self) {
        self.complete(Ok(Outcome::Continue));
    }

    pub fn respond(self, response: Response) {
        self.complete(Ok(Outcome::Respond(response)));
    }

    pub fn fail(self, error: impl Into<BoxError>) {
        self.complete(Err(error.into()));
    }

    fn complete(self, completion: Completion) {
        // The request may already be gone (client disconnect); nothing to do then.
        let _ = self.tx.send(completion);
    }
}

/// A callback-style request interceptor.
///
/// `call` must eventually fire `done` exactly once, either inline or from a
/// spawned task.
pub trait Middleware: Send + Sync + 'static {
    /// Name used in error messages, logs and metrics.
    fn name(&self) -> &'static str;

    fn call(&self, request: RequestContext, done: Done);
}
