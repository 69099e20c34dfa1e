//! Source watcher that invalidates the compiler unit on change.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};

use crate::compiler::CompilerUnit;

/// Watches source paths and requests a rebuild for every relevant change.
pub struct SourceWatcher {
    paths: Vec<PathBuf>,
    unit: Arc<CompilerUnit>,
}

impl SourceWatcher {
    pub fn new(paths: Vec<PathBuf>, unit: Arc<CompilerUnit>) -> Self {
        Self { paths, unit }
    }

    /// Start watching in notify's background thread.
    ///
    /// The returned watcher must be kept alive for as long as changes should
    /// trigger rebuilds.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let unit = Arc::clone(&self.unit);

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if is_relevant(&event) {
                        tracing::info!(paths = ?event.paths, "Source change detected, rebuilding...");
                        unit.invalidate();
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        for path in &self.paths {
            watcher.watch(path, RecursiveMode::Recursive)?;
        }

        tracing::info!(paths = ?self.paths, "Source watcher started");
        Ok(watcher)
    }
}

fn is_relevant(event: &Event) -> bool {
    event.kind.is_modify() || event.kind.is_create() || event.kind.is_remove()
}
