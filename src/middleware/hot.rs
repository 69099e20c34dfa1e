//! Hot-update notification middleware.
//!
//! # Responsibilities
//! - Serve a Server-Sent Events stream on the configured path
//! - Follow the client target's builds and broadcast building/built events
//! - Greet new connections with a sync event for the latest client build
//!
//! # Design Decisions
//! - Bound to the client target only; server rebuilds are not announced
//! - Each connection has a bounded queue; closed connections are pruned on broadcast

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::sync::mpsc::error::TrySendError;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

use crate::compiler::{build_hash, TargetCompiler, TargetStatus};
use crate::config::HotMiddlewareOptions;
use crate::middleware::{Done, Middleware, RequestContext};
use crate::observability::metrics;

const CLIENT_QUEUE: usize = 100;

/// Notification sent to connected browsers.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum HotEvent {
    Building { name: String },
    Built(BuildPayload),
    Sync(BuildPayload),
}

/// Result of a completed client build.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BuildPayload {
    pub name: String,
    pub hash: String,
    pub time: u64,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl BuildPayload {
    fn from_status(status: &TargetStatus) -> Option<Self> {
        match status {
            TargetStatus::Done {
                generation,
                duration,
                compilation,
            } => Some(Self {
                name: compilation.name.clone(),
                hash: build_hash(*generation),
                time: duration.as_millis() as u64,
                errors: compilation.errors.clone(),
                warnings: compilation.warnings.clone(),
            }),
            _ => None,
        }
    }
}

struct HotState {
    target: Arc<TargetCompiler>,
    options: HotMiddlewareOptions,
    heartbeat: Duration,
    clients: DashMap<u64, mpsc::Sender<String>>,
    next_client_id: AtomicU64,
}

impl HotState {
    fn broadcast(&self, event: &HotEvent) {
        let data = match serde_json::to_string(event) {
            Ok(data) => data,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize hot event");
                return;
            }
        };

        self.clients.retain(|id, tx| match tx.try_send(data.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::debug!(client_id = id, "Hot client queue full, event dropped");
                true
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(client_id = id, "Hot client disconnected");
                false
            }
        });
        metrics::record_hot_clients(self.clients.len());
    }

    fn register(&self) -> (u64, mpsc::Receiver<String>) {
        let id = self.next_client_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(CLIENT_QUEUE);

        if let Some(payload) = BuildPayload::from_status(&self.target.status()) {
            if let Ok(data) = serde_json::to_string(&HotEvent::Sync(payload)) {
                let _ = tx.try_send(data);
            }
        }

        self.clients.insert(id, tx);
        metrics::record_hot_clients(self.clients.len());
        (id, rx)
    }
}

/// Pushes build notifications for the client target over SSE.
#[derive(Clone)]
pub struct HotMiddleware {
    state: Arc<HotState>,
}

impl HotMiddleware {
    /// Bind to the client target and follow its builds. Must be called from
    /// within a Tokio runtime.
    ///
    /// A zero `heartbeat_ms` falls back to the default interval.
    pub fn new(target: Arc<TargetCompiler>, options: HotMiddlewareOptions) -> Self {
        let heartbeat_ms = match options.heartbeat_ms {
            0 => {
                let fallback = HotMiddlewareOptions::default().heartbeat_ms;
                tracing::warn!(heartbeat_ms = fallback, "Zero hot heartbeat interval, using default");
                fallback
            }
            ms => ms,
        };

        let rx = target.subscribe();
        let state = Arc::new(HotState {
            target,
            options,
            heartbeat: Duration::from_millis(heartbeat_ms),
            clients: DashMap::new(),
            next_client_id: AtomicU64::new(0),
        });
        tokio::spawn(follow_target(Arc::downgrade(&state), rx));

        Self { state }
    }

    pub fn path(&self) -> &str {
        &self.state.options.path
    }

    /// Keep-alive interval of opened event streams.
    pub fn heartbeat(&self) -> Duration {
        self.state.heartbeat
    }

    /// Number of connected event streams.
    pub fn client_count(&self) -> usize {
        self.state.clients.len()
    }
}

impl Middleware for HotMiddleware {
    fn name(&self) -> &'static str {
        "hot"
    }

    fn call(&self, request: RequestContext, done: Done) {
        if request.path() != self.state.options.path {
            return done.next();
        }

        let (id, rx) = self.state.register();
        tracing::debug!(client_id = id, "Hot client connected");

        let stream = ReceiverStream::new(rx).map(|data| Ok::<_, std::convert::Infallible>(Event::default().data(data)));
        let keep_alive = KeepAlive::new()
            .interval(self.state.heartbeat)
            .text("\u{1F493}");

        done.respond(Sse::new(stream).keep_alive(keep_alive).into_response());
    }
}

async fn follow_target(weak: Weak<HotState>, mut rx: watch::Receiver<TargetStatus>) {
    while rx.changed().await.is_ok() {
        let status = rx.borrow_and_update().clone();
        let Some(state) = weak.upgrade() else {
            break;
        };

        let event = match &status {
            TargetStatus::Idle => continue,
            TargetStatus::Building { .. } => {
                if state.options.log {
                    tracing::info!(target_name = %state.target.name(), "webpack building...");
                }
                HotEvent::Building {
                    name: state.target.name().to_string(),
                }
            }
            TargetStatus::Done { .. } => {
                let Some(payload) = BuildPayload::from_status(&status) else {
                    continue;
                };
                if state.options.log {
                    tracing::info!(
                        target_name = %payload.name,
                        hash = %payload.hash,
                        time_ms = payload.time,
                        "webpack built"
                    );
                }
                HotEvent::Built(payload)
            }
        };

        state.broadcast(&event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{create_compiler, Bundler, Compilation, CompilerUnit, TargetKind};
    use crate::config::TargetConfig;
    use crate::error::BoxError;
    use crate::middleware::Outcome;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request};

    struct WarnBundler;

    #[async_trait]
    impl Bundler for WarnBundler {
        async fn compile(&self, target: &TargetConfig) -> Result<Compilation, BoxError> {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let mut compilation = Compilation::new(target.name.clone());
            compilation.warnings.push("large bundle".into());
            Ok(compilation)
        }
    }

    fn setup() -> (Arc<CompilerUnit>, HotMiddleware) {
        let unit = create_compiler(Arc::new(WarnBundler), Some(TargetConfig::new("client")), None).unwrap();
        let client = Arc::clone(unit.target(TargetKind::Client).unwrap());
        let hot = HotMiddleware::new(client, HotMiddlewareOptions::default());
        (unit, hot)
    }

    async fn connect(hot: &HotMiddleware) -> axum::body::BodyDataStream {
        let request = Request::builder().uri("/__webpack_hmr").body(()).unwrap();
        let (done, rx) = Done::channel();
        hot.call(RequestContext::from_request(&request), done);
        let Outcome::Respond(response) = rx.await.unwrap().unwrap() else {
            panic!("event stream was not opened");
        };
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream");
        response.into_body().into_data_stream()
    }

    async fn next_event(stream: &mut axum::body::BodyDataStream) -> serde_json::Value {
        let chunk = tokio::time::timeout(Duration::from_secs(5), stream.next())
            .await
            .expect("event within timeout")
            .expect("stream open")
            .unwrap();
        let text = String::from_utf8(chunk.to_vec()).unwrap();
        let data = text.trim().strip_prefix("data: ").expect("data frame");
        serde_json::from_str(data).unwrap()
    }

    #[test]
    fn test_event_encoding() {
        let event = HotEvent::Building { name: "client".into() };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            serde_json::json!({ "action": "building", "name": "client" })
        );
    }

    #[tokio::test]
    async fn test_zero_heartbeat_uses_default() {
        let unit = create_compiler(Arc::new(WarnBundler), Some(TargetConfig::new("client")), None).unwrap();
        let client = Arc::clone(unit.target(TargetKind::Client).unwrap());
        let options = HotMiddlewareOptions {
            heartbeat_ms: 0,
            ..Default::default()
        };
        let hot = HotMiddleware::new(client, options);
        assert_eq!(hot.heartbeat(), Duration::from_secs(10));

        // No build has run, so an open stream stays silent.
        let mut stream = connect(&hot).await;
        assert!(tokio::time::timeout(Duration::from_millis(50), stream.next()).await.is_err());
    }

    #[tokio::test]
    async fn test_other_paths_continue() {
        let (_unit, hot) = setup();
        let request = Request::builder().uri("/app.js").body(Body::empty()).unwrap();
        let (done, rx) = Done::channel();
        hot.call(RequestContext::from_request(&request), done);
        assert!(matches!(rx.await.unwrap().unwrap(), Outcome::Continue));
        assert_eq!(hot.client_count(), 0);
    }

    #[tokio::test]
    async fn test_sync_then_build_events() {
        let (unit, hot) = setup();
        unit.run().await;

        let mut stream = connect(&hot).await;
        assert_eq!(hot.client_count(), 1);

        let sync = next_event(&mut stream).await;
        assert_eq!(sync["action"], "sync");
        assert_eq!(sync["hash"], build_hash(1));
        assert_eq!(sync["warnings"][0], "large bundle");

        unit.run().await;
        // The announcement of the first build may still be in flight.
        let mut actions = Vec::new();
        loop {
            let event = next_event(&mut stream).await;
            let action = event["action"].as_str().unwrap().to_string();
            if action == "built" && event["hash"] == build_hash(2) {
                break;
            }
            actions.push(action);
        }
        assert_eq!(actions.last().map(String::as_str), Some("building"));
    }
}
