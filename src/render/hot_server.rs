//! Server-render middleware: follows server builds and publishes the latest
//! render capability.

use std::sync::{Arc, Weak};
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::watch;

use crate::compiler::{BuildStats, BuildStatus, CompilerUnit, TargetKind};
use crate::config::HotServerMiddlewareOptions;
use crate::error::{CompileError, RenderError};
use crate::render::{Render, RendererContext};

/// Render capability of one build generation.
#[derive(Clone)]
pub enum RenderState {
    /// No server build has completed yet.
    Pending,
    Ready(Arc<dyn Render>),
    Failed(Arc<CompileError>),
}

impl std::fmt::Debug for RenderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenderState::Pending => f.write_str("Pending"),
            RenderState::Ready(_) => f.write_str("Ready"),
            RenderState::Failed(e) => f.debug_tuple("Failed").field(e).finish(),
        }
    }
}

/// Immutable pairing of a generation with its render state.
#[derive(Debug, Clone)]
pub struct RenderSnapshot {
    pub generation: u64,
    pub state: RenderState,
}

impl RenderSnapshot {
    pub fn pending() -> Self {
        Self {
            generation: 0,
            state: RenderState::Pending,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, RenderState::Pending)
    }

    /// Derive the snapshot for a completed build.
    pub fn from_stats(stats: &BuildStats, options: &serde_json::Value) -> Self {
        Self {
            generation: stats.generation,
            state: derive_state(stats, options),
        }
    }
}

fn derive_state(stats: &BuildStats, options: &serde_json::Value) -> RenderState {
    let server = TargetKind::Server.as_str();
    let failed = |messages: Vec<String>| RenderState::Failed(Arc::new(CompileError::new(server, messages)));

    let Some(server_stats) = stats.get(server) else {
        return failed(vec!["no server compilation in this build".to_string()]);
    };

    if let Some(error) = server_stats.compile_error() {
        return RenderState::Failed(Arc::new(error));
    }

    let Some(factory) = &server_stats.renderer else {
        return failed(vec!["server bundle does not export a renderer".to_string()]);
    };

    let context = RendererContext {
        generation: stats.generation,
        client_stats: stats.get(TargetKind::Client.as_str()).cloned(),
        server_stats: Arc::clone(server_stats),
        options: options.clone(),
    };

    match factory.create(&context) {
        Ok(renderer) => RenderState::Ready(renderer),
        Err(e) => failed(vec![format!("server renderer could not be created: {e}")]),
    }
}

/// Keeps the latest server render capability for the catch-all handler.
pub struct HotServerMiddleware {
    snapshot: ArcSwap<RenderSnapshot>,
    published: watch::Sender<u64>,
    options: HotServerMiddlewareOptions,
}

impl HotServerMiddleware {
    /// Bind to `unit` and follow its builds. Must be called from within a
    /// Tokio runtime.
    pub fn new(unit: &Arc<CompilerUnit>, options: HotServerMiddlewareOptions) -> Arc<Self> {
        let (published, _) = watch::channel(0);
        let middleware = Arc::new(Self {
            snapshot: ArcSwap::from_pointee(RenderSnapshot::pending()),
            published,
            options,
        });

        let weak = Arc::downgrade(&middleware);
        let rx = unit.subscribe();
        tokio::spawn(follow_builds(weak, rx));

        middleware
    }

    /// Replace the current snapshot with the one derived from `stats`.
    pub fn publish(&self, stats: &BuildStats) {
        let snapshot = RenderSnapshot::from_stats(stats, &self.options.server_renderer_options);
        match &snapshot.state {
            RenderState::Failed(e) => {
                tracing::warn!(generation = snapshot.generation, error = %e, "Server renderer unavailable")
            }
            _ => tracing::info!(generation = snapshot.generation, "Server renderer updated"),
        }

        let generation = snapshot.generation;
        self.snapshot.store(Arc::new(snapshot));
        self.published.send_replace(generation);
    }

    /// The latest snapshot, possibly still pending.
    pub fn current(&self) -> Arc<RenderSnapshot> {
        self.snapshot.load_full()
    }

    /// The latest snapshot, waiting for the first server build if needed.
    pub async fn ready_snapshot(&self) -> Result<Arc<RenderSnapshot>, RenderError> {
        let snapshot = self.current();
        if !snapshot.is_pending() {
            return Ok(snapshot);
        }

        let waited = Duration::from_millis(self.options.initial_build_timeout_ms);
        tracing::debug!(timeout_ms = self.options.initial_build_timeout_ms, "Waiting for initial server build");

        let mut rx = self.published.subscribe();
        let ready = matches!(
            tokio::time::timeout(waited, rx.wait_for(|generation| *generation > 0)).await,
            Ok(Ok(_))
        );

        if ready {
            Ok(self.current())
        } else {
            Err(RenderError::Building { waited })
        }
    }
}

async fn follow_builds(weak: Weak<HotServerMiddleware>, mut rx: watch::Receiver<BuildStatus>) {
    loop {
        let status = rx.borrow_and_update().clone();
        if let BuildStatus::Done(stats) = status {
            let Some(middleware) = weak.upgrade() else {
                break;
            };
            middleware.publish(&stats);
        }

        if rx.changed().await.is_err() {
            break;
        }
    }
}
