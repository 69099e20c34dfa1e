//! Server-side rendering subsystem.
//!
//! # Data Flow
//! ```text
//! CompilerUnit build Done
//!     → hot_server.rs (derive RenderSnapshot from the server compilation)
//!     → ArcSwap store (whole snapshot replaced at once)
//!
//! GET <unmatched path>
//!     → handler.rs (load latest snapshot, wait if still pending)
//!     → create_handler (snapshot → renderer or RenderError)
//!     → Render::render(request) → response
//! ```
//!
//! # Design Decisions
//! - A failed latest build never falls back to an older renderer
//! - Snapshots carry their build generation for diagnostics
//! - Renderer and factory are traits so bundlers can export anything callable

pub mod handler;
pub mod hot_server;

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use axum::response::Response;

use crate::compiler::Compilation;
use crate::error::BoxError;

pub use handler::{create_handler, render_handler};
pub use hot_server::{HotServerMiddleware, RenderSnapshot, RenderState};

/// A render function exported by a compiled server bundle.
#[async_trait]
pub trait Render: Send + Sync + 'static {
    async fn render(&self, request: Request<Body>) -> Result<Response, BoxError>;
}

/// The server bundle's export: builds a renderer for one build generation.
pub trait RenderFactory: Send + Sync + 'static {
    fn create(&self, context: &RendererContext) -> Result<Arc<dyn Render>, BoxError>;
}

impl<F> RenderFactory for F
where
    F: Fn(&RendererContext) -> Result<Arc<dyn Render>, BoxError> + Send + Sync + 'static,
{
    fn create(&self, context: &RendererContext) -> Result<Arc<dyn Render>, BoxError> {
        self(context)
    }
}

/// What a render factory gets to see about the build it belongs to.
#[derive(Debug, Clone)]
pub struct RendererContext {
    pub generation: u64,
    /// The client compilation of the same generation, for asset references.
    pub client_stats: Option<Arc<Compilation>>,
    pub server_stats: Arc<Compilation>,
    /// `server_renderer_options` from the plugin options.
    pub options: serde_json::Value,
}

/// Adapter turning an async closure into a [`Render`].
pub struct RenderFn<F>(F);

#[async_trait]
impl<F, Fut> Render for RenderFn<F>
where
    F: Fn(Request<Body>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response, BoxError>> + Send + 'static,
{
    async fn render(&self, request: Request<Body>) -> Result<Response, BoxError> {
        (self.0)(request).await
    }
}

/// Wrap an async closure as a shareable renderer.
pub fn render_fn<F, Fut>(f: F) -> Arc<dyn Render>
where
    F: Fn(Request<Body>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response, BoxError>> + Send + 'static,
{
    Arc::new(RenderFn(f))
}
