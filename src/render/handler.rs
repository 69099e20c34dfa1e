//! Catch-all render handler.
//!
//! # Responsibilities
//! - Answer every GET the host router does not match itself
//! - Turn the latest render snapshot into a response or an error
//!
//! # Design Decisions
//! - Installed as the router fallback, so host routes always take priority
//! - Non-GET requests reaching the fallback get a plain 404
//! - Errors go through `RequestError`'s response path, never through the renderer

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, MethodRouter};
use axum::Router;

use crate::error::{RenderError, RequestError};
use crate::observability::metrics;
use crate::render::{HotServerMiddleware, Render, RenderSnapshot, RenderState};

/// Build the per-request handler from a snapshot.
///
/// Fails when the snapshot carries a compile error or no build has completed.
pub fn create_handler(snapshot: &RenderSnapshot) -> Result<Arc<dyn Render>, RenderError> {
    match &snapshot.state {
        RenderState::Ready(renderer) => Ok(Arc::clone(renderer)),
        RenderState::Failed(error) => Err(RenderError::Unavailable(Arc::clone(error))),
        RenderState::Pending => Err(RenderError::Building {
            waited: Duration::ZERO,
        }),
    }
}

/// Render the request with the latest server bundle.
pub async fn render_handler(
    State(middleware): State<Arc<HotServerMiddleware>>,
    request: Request<Body>,
) -> Result<Response, RequestError> {
    let result = render(&middleware, request).await;
    metrics::record_render(match &result {
        Ok(_) => "ok",
        Err(RenderError::Unavailable(_)) => "unavailable",
        Err(RenderError::Building { .. }) => "building",
        Err(RenderError::Failed(_)) => "failed",
    });
    result.map_err(RequestError::from)
}

async fn render(middleware: &HotServerMiddleware, request: Request<Body>) -> Result<Response, RenderError> {
    let snapshot = middleware.ready_snapshot().await?;
    let renderer = create_handler(&snapshot)?;

    tracing::debug!(
        generation = snapshot.generation,
        method = %request.method(),
        path = %request.uri().path(),
        "Rendering request"
    );

    renderer.render(request).await.map_err(RenderError::Failed)
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Not Found")
}

/// Register the catch-all on `server`. Replaces any fallback already set.
pub fn install(server: Router, middleware: Arc<HotServerMiddleware>) -> Router {
    let catch_all: MethodRouter = get(render_handler).fallback(not_found).with_state(middleware);
    server.fallback_service(catch_all)
}
