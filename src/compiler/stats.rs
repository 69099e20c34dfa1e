//! Build results: per-target compilations and per-build generations.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use serde::Serialize;

use crate::error::CompileError;
use crate::render::RenderFactory;

/// A single emitted file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub content: Bytes,
    pub content_type: String,
}

impl Asset {
    pub fn new(content: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            content_type: content_type.into(),
        }
    }
}

/// Result of compiling one build target.
#[derive(Clone, Default)]
pub struct Compilation {
    /// Name of the target this compilation belongs to.
    pub name: String,

    /// URL prefix the assets are served under, taken from the target's output.
    pub public_path: String,

    /// Emitted files keyed by path relative to the target's output (`/`-separated).
    pub assets: BTreeMap<String, Asset>,

    pub errors: Vec<String>,

    pub warnings: Vec<String>,

    /// Render export of a server bundle.
    pub renderer: Option<Arc<dyn RenderFactory>>,
}

impl Compilation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// A compilation that produced nothing but the given error.
    pub fn failed(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            errors: vec![error.into()],
            ..Default::default()
        }
    }

    pub fn with_asset(mut self, path: impl Into<String>, asset: Asset) -> Self {
        self.assets.insert(path.into(), asset);
        self
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn RenderFactory>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn asset(&self, path: &str) -> Option<&Asset> {
        self.assets.get(path)
    }

    /// The compiler errors of this compilation, if any.
    pub fn compile_error(&self) -> Option<CompileError> {
        if self.errors.is_empty() {
            None
        } else {
            Some(CompileError::new(self.name.clone(), self.errors.clone()))
        }
    }
}

impl fmt::Debug for Compilation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Compilation")
            .field("name", &self.name)
            .field("public_path", &self.public_path)
            .field("assets", &self.assets.keys().collect::<Vec<_>>())
            .field("errors", &self.errors)
            .field("warnings", &self.warnings)
            .field("renderer", &self.renderer.is_some())
            .finish()
    }
}

/// One completed build of every target in a compiler unit.
#[derive(Debug, Clone)]
pub struct BuildStats {
    /// Monotonic build counter, starting at 1.
    pub generation: u64,

    pub duration: Duration,

    /// One compilation per target, in target order.
    pub compilations: Vec<Arc<Compilation>>,
}

impl BuildStats {
    pub fn get(&self, name: &str) -> Option<&Arc<Compilation>> {
        self.compilations.iter().find(|c| c.name == name)
    }

    pub fn has_errors(&self) -> bool {
        self.compilations.iter().any(|c| c.has_errors())
    }

    /// Short hash identifying this build in notifications.
    pub fn hash(&self) -> String {
        build_hash(self.generation)
    }

    pub fn summaries(&self) -> Vec<CompilationSummary> {
        self.compilations
            .iter()
            .map(|c| CompilationSummary::new(c, self))
            .collect()
    }
}

/// Hash of the given build generation as shown to clients.
pub fn build_hash(generation: u64) -> String {
    format!("{generation:016x}")
}

/// Serializable view of a compilation for notifications and admin output.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CompilationSummary {
    pub name: String,
    pub hash: String,
    pub time: u64,
    pub assets: Vec<String>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl CompilationSummary {
    pub fn new(compilation: &Compilation, stats: &BuildStats) -> Self {
        Self {
            name: compilation.name.clone(),
            hash: stats.hash(),
            time: stats.duration.as_millis() as u64,
            assets: compilation.assets.keys().cloned().collect(),
            errors: compilation.errors.clone(),
            warnings: compilation.warnings.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compilation_errors() {
        let ok = Compilation::new("client").with_asset("main.js", Asset::new("1", "application/javascript"));
        assert!(!ok.has_errors());
        assert!(ok.compile_error().is_none());
        assert!(ok.asset("main.js").is_some());

        let failed = Compilation::failed("server", "Module not found: ./App");
        let err = failed.compile_error().unwrap();
        assert_eq!(err.target, "server");
        assert_eq!(err.messages, vec!["Module not found: ./App"]);
    }

    #[test]
    fn test_build_stats_lookup() {
        let stats = BuildStats {
            generation: 3,
            duration: Duration::from_millis(42),
            compilations: vec![
                Arc::new(Compilation::new("client").with_asset("main.js", Asset::new("x", "application/javascript"))),
                Arc::new(Compilation::failed("server", "boom")),
            ],
        };

        assert!(stats.get("client").is_some());
        assert!(stats.get("worker").is_none());
        assert!(stats.has_errors());
        assert_eq!(stats.hash(), "0000000000000003");

        let summaries = stats.summaries();
        assert_eq!(summaries[0].assets, vec!["main.js"]);
        assert_eq!(summaries[0].time, 42);
        assert_eq!(summaries[1].errors, vec!["boom"]);
    }
}
