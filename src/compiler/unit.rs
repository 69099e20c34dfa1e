//! The compiler unit: a single build lifecycle over one or two targets.
//!
//! # Responsibilities
//! - Build every target together and publish the result as one generation
//! - Track per-target status for middleware bound to a single target
//! - Serialize builds and coalesce rebuild requests
//!
//! # Design Decisions
//! - Status is published through `tokio::sync::watch` (single writer)
//! - The last completed generation stays readable while the next one builds
//! - The watch loop is started at most once and stops on `close()`

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwapOption;
use futures_util::future::join_all;
use tokio::sync::{watch, Mutex, Notify};

use crate::compiler::{BuildStats, Bundler, Compilation, TargetKind};
use crate::config::TargetConfig;
use crate::observability::metrics;

/// Build state of the whole unit.
#[derive(Debug, Clone)]
pub enum BuildStatus {
    /// No build has been started yet.
    Idle,
    /// A build of the given generation is running.
    Building { generation: u64 },
    /// The given generation completed.
    Done(Arc<BuildStats>),
}

impl BuildStatus {
    pub fn is_done(&self) -> bool {
        matches!(self, BuildStatus::Done(_))
    }

    pub fn stats(&self) -> Option<&Arc<BuildStats>> {
        match self {
            BuildStatus::Done(stats) => Some(stats),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BuildStatus::Idle => "idle",
            BuildStatus::Building { .. } => "building",
            BuildStatus::Done(_) => "done",
        }
    }
}

/// Build state of a single target.
#[derive(Debug, Clone)]
pub enum TargetStatus {
    Idle,
    Building {
        generation: u64,
    },
    Done {
        generation: u64,
        duration: Duration,
        compilation: Arc<Compilation>,
    },
}

/// One named target inside a compiler unit.
#[derive(Debug)]
pub struct TargetCompiler {
    kind: TargetKind,
    config: TargetConfig,
    status: watch::Sender<TargetStatus>,
}

impl TargetCompiler {
    fn new(kind: TargetKind, config: TargetConfig) -> Self {
        let (status, _) = watch::channel(TargetStatus::Idle);
        Self {
            kind,
            config,
            status,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn kind(&self) -> TargetKind {
        self.kind
    }

    pub fn config(&self) -> &TargetConfig {
        &self.config
    }

    /// Subscribe to this target's build status.
    pub fn subscribe(&self) -> watch::Receiver<TargetStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> TargetStatus {
        self.status.borrow().clone()
    }
}

/// Coordinates the client and optional server targets as one build.
pub struct CompilerUnit {
    targets: Vec<Arc<TargetCompiler>>,
    bundler: Arc<dyn Bundler>,
    status: watch::Sender<BuildStatus>,
    last_stats: ArcSwapOption<BuildStats>,
    generation: AtomicU64,
    build_lock: Mutex<()>,
    invalidated: Notify,
    watching: AtomicBool,
    closed: AtomicBool,
}

impl CompilerUnit {
    pub(crate) fn new(bundler: Arc<dyn Bundler>, targets: Vec<(TargetKind, TargetConfig)>) -> Self {
        let (status, _) = watch::channel(BuildStatus::Idle);
        Self {
            targets: targets
                .into_iter()
                .map(|(kind, config)| Arc::new(TargetCompiler::new(kind, config)))
                .collect(),
            bundler,
            status,
            last_stats: ArcSwapOption::empty(),
            generation: AtomicU64::new(0),
            build_lock: Mutex::new(()),
            invalidated: Notify::new(),
            watching: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    /// All targets in build order.
    pub fn targets(&self) -> &[Arc<TargetCompiler>] {
        &self.targets
    }

    /// Look a target up by its role name.
    pub fn target(&self, kind: TargetKind) -> Option<&Arc<TargetCompiler>> {
        self.targets.iter().find(|t| t.name() == kind.as_str())
    }

    pub fn is_client_only(&self) -> bool {
        self.target(TargetKind::Server).is_none()
    }

    /// Subscribe to build status changes.
    pub fn subscribe(&self) -> watch::Receiver<BuildStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> BuildStatus {
        self.status.borrow().clone()
    }

    /// The last completed generation, even while a newer one is building.
    pub fn last_stats(&self) -> Option<Arc<BuildStats>> {
        self.last_stats.load_full()
    }

    /// Wait until no build is pending and return the completed generation.
    ///
    /// Returns immediately if the current status is already `Done`.
    pub async fn wait_until_done(&self) -> Option<Arc<BuildStats>> {
        let mut rx = self.subscribe();
        rx.wait_for(BuildStatus::is_done)
            .await
            .ok()
            .and_then(|status| status.stats().cloned())
    }

    /// Build every target once and publish the resulting generation.
    pub async fn run(&self) -> Arc<BuildStats> {
        let _guard = self.build_lock.lock().await;

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.status.send_replace(BuildStatus::Building { generation });
        for target in &self.targets {
            target.status.send_replace(TargetStatus::Building { generation });
        }

        tracing::info!(generation, targets = self.targets.len(), "Build started");
        let started = Instant::now();

        let compilations = join_all(self.targets.iter().map(|t| self.compile_target(t))).await;
        let duration = started.elapsed();

        for (target, compilation) in self.targets.iter().zip(&compilations) {
            metrics::record_build(target.name(), !compilation.has_errors(), duration);
            target.status.send_replace(TargetStatus::Done {
                generation,
                duration,
                compilation: Arc::clone(compilation),
            });
        }

        let stats = Arc::new(BuildStats {
            generation,
            duration,
            compilations,
        });

        if stats.has_errors() {
            let errors: usize = stats.compilations.iter().map(|c| c.errors.len()).sum();
            tracing::warn!(
                generation,
                errors,
                duration_ms = duration.as_millis() as u64,
                "Failed to compile"
            );
        } else {
            tracing::info!(
                generation,
                duration_ms = duration.as_millis() as u64,
                "Compiled successfully"
            );
        }

        self.last_stats.store(Some(Arc::clone(&stats)));
        self.status.send_replace(BuildStatus::Done(Arc::clone(&stats)));
        stats
    }

    async fn compile_target(&self, target: &TargetCompiler) -> Arc<Compilation> {
        let mut compilation = match self.bundler.compile(target.config()).await {
            Ok(compilation) => compilation,
            Err(e) => {
                tracing::error!(target_name = %target.name(), error = %e, "Bundler failed");
                Compilation::failed(target.name(), e.to_string())
            }
        };
        compilation.name = target.name().to_string();
        compilation.public_path = target.config().output.public_path.clone();
        Arc::new(compilation)
    }

    /// Start the background build loop: build now, then once per invalidation.
    ///
    /// Returns `false` if the loop was already running. Must be called from
    /// within a Tokio runtime.
    pub fn watch(self: &Arc<Self>) -> bool {
        if self.watching.swap(true, Ordering::SeqCst) {
            return false;
        }

        let unit = Arc::clone(self);
        tokio::spawn(async move {
            while !unit.is_closed() {
                unit.run().await;
                unit.invalidated.notified().await;
            }
            tracing::debug!("Compiler watch loop stopped");
        });

        tracing::debug!("Compiler watch loop started");
        true
    }

    pub fn is_watching(&self) -> bool {
        self.watching.load(Ordering::SeqCst)
    }

    /// Request a rebuild. Requests made while a build runs collapse into one.
    pub fn invalidate(&self) {
        tracing::debug!("Compiler invalidated");
        self.invalidated.notify_one();
    }

    /// Stop the watch loop after the current build.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.invalidated.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for CompilerUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompilerUnit")
            .field("targets", &self.targets)
            .field("status", &self.status.borrow().label())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::create_compiler;
    use crate::error::BoxError;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    /// Counts compile calls; fails the server target on demand.
    #[derive(Default)]
    struct CountingBundler {
        calls: AtomicUsize,
        fail_server: AtomicBool,
    }

    #[async_trait]
    impl Bundler for CountingBundler {
        async fn compile(&self, target: &TargetConfig) -> Result<Compilation, BoxError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if target.name == "server" && self.fail_server.load(Ordering::SeqCst) {
                return Err("cannot resolve ./App".into());
            }
            Ok(Compilation::new("ignored"))
        }
    }

    fn unit(bundler: Arc<CountingBundler>) -> Arc<CompilerUnit> {
        create_compiler(
            bundler,
            Some(TargetConfig::new("client")),
            Some(TargetConfig::new("server")),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_run_publishes_generation() {
        let bundler = Arc::new(CountingBundler::default());
        let unit = unit(bundler.clone());

        let first = unit.run().await;
        assert_eq!(first.generation, 1);
        assert_eq!(bundler.calls.load(Ordering::SeqCst), 2);
        // Compilations are bound to their target regardless of what the bundler named them.
        assert!(first.get("client").is_some());
        assert!(first.get("server").is_some());
        assert_eq!(first.get("client").unwrap().public_path, "/");

        let second = unit.run().await;
        assert_eq!(second.generation, 2);
        assert_eq!(unit.last_stats().unwrap().generation, 2);
        assert!(unit.status().is_done());
    }

    #[tokio::test]
    async fn test_bundler_error_becomes_compilation_error() {
        let bundler = Arc::new(CountingBundler::default());
        bundler.fail_server.store(true, Ordering::SeqCst);
        let unit = unit(bundler);

        let stats = unit.run().await;
        assert!(stats.has_errors());
        assert_eq!(stats.get("server").unwrap().errors, vec!["cannot resolve ./App"]);
        assert!(!stats.get("client").unwrap().has_errors());
    }

    #[tokio::test]
    async fn test_target_status_follows_build() {
        let unit = unit(Arc::new(CountingBundler::default()));
        let client = Arc::clone(unit.target(TargetKind::Client).unwrap());
        assert!(matches!(client.status(), TargetStatus::Idle));

        unit.run().await;
        match client.status() {
            TargetStatus::Done { generation, compilation, .. } => {
                assert_eq!(generation, 1);
                assert_eq!(compilation.name, "client");
            }
            other => panic!("unexpected status {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_watch_builds_and_rebuilds_on_invalidate() {
        let bundler = Arc::new(CountingBundler::default());
        let unit = unit(bundler.clone());

        assert!(unit.watch());
        assert!(!unit.watch(), "watch loop starts only once");

        let first = unit.wait_until_done().await.unwrap();
        assert_eq!(first.generation, 1);

        let mut rx = unit.subscribe();
        unit.invalidate();
        let next = rx
            .wait_for(|s| matches!(s, BuildStatus::Done(stats) if stats.generation == 2))
            .await
            .unwrap()
            .clone();
        assert!(next.is_done());

        unit.close();
        assert!(unit.is_closed());
    }
}
