//! Error types for plugin registration and request handling.
//!
//! # Design Decisions
//! - Configuration errors abort registration; everything else is request-scoped
//! - Request errors carry the underlying diagnostic into the response body
//! - No error in this crate is retried

use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::observability::metrics;

/// Boxed error used at collaborator seams (bundler, renderer, middleware).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Build target configuration errors, detected before any compiler exists.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// No client configuration was supplied.
    #[error("no client config found for the bundler")]
    MissingClient,

    /// The client configuration is not named `client`.
    #[error("the `name` of the client config must be `client` (found `{found}`)")]
    ClientName { found: String },

    /// The server configuration is not named `server`.
    #[error("the `name` of the server config must be `server` (found `{found}`)")]
    ServerName { found: String },
}

/// Errors that abort plugin registration.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// An invariant of the compiler factory did not hold.
    #[error("internal consistency error: {0}")]
    InternalConsistency(String),
}

/// Compiler diagnostics of a failed target build.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{target} build failed: {}", .messages.join("\n"))]
pub struct CompileError {
    pub target: String,
    pub messages: Vec<String>,
}

impl CompileError {
    pub fn new(target: impl Into<String>, messages: Vec<String>) -> Self {
        Self {
            target: target.into(),
            messages,
        }
    }
}

/// An installed interceptor failed to complete a request.
#[derive(Debug, Error)]
pub enum MiddlewareError {
    /// The middleware signalled completion with an error.
    #[error("{middleware} middleware failed: {source}")]
    Failed {
        middleware: &'static str,
        #[source]
        source: BoxError,
    },

    /// The middleware dropped its completion handle without signalling.
    #[error("{middleware} middleware dropped the request without completing it")]
    Abandoned { middleware: &'static str },
}

impl MiddlewareError {
    pub fn middleware(&self) -> &'static str {
        match self {
            MiddlewareError::Failed { middleware, .. } => middleware,
            MiddlewareError::Abandoned { middleware } => middleware,
        }
    }
}

/// The catch-all render handler could not produce a response.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The most recent server build failed.
    #[error("server renderer unavailable: {0}")]
    Unavailable(#[source] Arc<CompileError>),

    /// The initial server build did not finish in time.
    #[error("server bundle is still building (waited {waited:?})")]
    Building { waited: Duration },

    /// The renderer itself failed while producing the response.
    #[error("server render failed: {0}")]
    Failed(#[source] BoxError),
}

/// Request-scoped failure surfaced through the host's error response path.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error(transparent)]
    Middleware(#[from] MiddlewareError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

impl RequestError {
    pub fn status(&self) -> StatusCode {
        match self {
            RequestError::Render(RenderError::Building { .. }) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            RequestError::Middleware(e) => {
                metrics::record_middleware_failure(e.middleware());
                tracing::error!(middleware = e.middleware(), error = %e, "Request failed in middleware");
            }
            RequestError::Render(e) => {
                tracing::error!(status = status.as_u16(), error = %e, "Server render failed");
            }
        }

        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.to_string(),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ConfigurationError::ClientName {
            found: "browser".into(),
        };
        assert!(err.to_string().contains("browser"));

        let err = CompileError::new("server", vec!["Module not found".into(), "Syntax error".into()]);
        assert_eq!(err.to_string(), "server build failed: Module not found\nSyntax error");
    }

    #[test]
    fn test_request_error_status() {
        let building = RequestError::from(RenderError::Building {
            waited: Duration::from_secs(1),
        });
        assert_eq!(building.status(), StatusCode::SERVICE_UNAVAILABLE);

        let unavailable = RequestError::from(RenderError::Unavailable(Arc::new(CompileError::new(
            "server",
            vec!["boom".into()],
        ))));
        assert_eq!(unavailable.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let abandoned = RequestError::from(MiddlewareError::Abandoned { middleware: "dev" });
        assert_eq!(abandoned.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_error_response_carries_diagnostic() {
        let err = RequestError::from(RenderError::Unavailable(Arc::new(CompileError::new(
            "server",
            vec!["Unexpected token".into()],
        ))));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("Unexpected token"));
    }
}
