//! Ordered interceptor chain mounted as a single axum layer.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::{from_fn_with_state, Next};
use axum::response::{IntoResponse, Response};
use axum::Router;

use crate::error::{MiddlewareError, RequestError};
use crate::middleware::{Done, Middleware, Outcome, RequestContext};

/// Interceptors in installation order.
#[derive(Clone, Default)]
pub struct InterceptorChain {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl InterceptorChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `middleware`; it runs after everything installed before it.
    pub fn install(&mut self, middleware: Arc<dyn Middleware>) -> &mut Self {
        tracing::debug!(middleware = middleware.name(), position = self.middlewares.len(), "Installing middleware");
        self.middlewares.push(middleware);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.middlewares.iter().map(|m| m.name()).collect()
    }

    /// Run every interceptor in order until one answers or fails.
    ///
    /// `Ok(None)` means all of them let the request through.
    pub async fn dispatch(&self, request: &RequestContext) -> Result<Option<Response>, MiddlewareError> {
        for middleware in &self.middlewares {
            let (done, completion) = Done::channel();
            middleware.call(request.clone(), done);

            match completion.await {
                Ok(Ok(Outcome::Continue)) => continue,
                Ok(Ok(Outcome::Respond(response))) => {
                    tracing::trace!(middleware = middleware.name(), path = request.path(), "Request answered by middleware");
                    return Ok(Some(response));
                }
                Ok(Err(source)) => {
                    return Err(MiddlewareError::Failed {
                        middleware: middleware.name(),
                        source,
                    })
                }
                Err(_) => {
                    return Err(MiddlewareError::Abandoned {
                        middleware: middleware.name(),
                    })
                }
            }
        }
        Ok(None)
    }

    /// Wrap `router` so the chain runs before its routes and fallback.
    ///
    /// Routes added to the returned router afterwards are not intercepted.
    pub fn apply(self, router: Router) -> Router {
        if self.is_empty() {
            return router;
        }
        router.layer(from_fn_with_state(Arc::new(self), intercept))
    }
}

impl std::fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptorChain").field("middlewares", &self.names()).finish()
    }
}

async fn intercept(State(chain): State<Arc<InterceptorChain>>, request: Request, next: Next) -> Response {
    let context = RequestContext::from_request(&request);
    match chain.dispatch(&context).await {
        Ok(Some(response)) => response,
        Ok(None) => next.run(request).await,
        Err(e) => RequestError::from(e).into_response(),
    }
}
