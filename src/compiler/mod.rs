//! Compiler subsystem.
//!
//! # Data Flow
//! ```text
//! TargetConfig (client, optional server)
//!     → factory.rs (validate names, fix target order)
//!     → unit.rs (CompilerUnit: one build lifecycle for all targets)
//!     → Bundler::compile per target, concurrently
//!     → BuildStats generation published on a watch channel
//!
//! On source change:
//!     watcher.rs (or admin code) calls CompilerUnit::invalidate
//!     → coalesced into one rebuild
//!     → subscribers observe the next generation
//! ```
//!
//! # Design Decisions
//! - Compilation is delegated to a `Bundler`; `FsBundler` only runs external commands
//! - Builds are serialized; a generation is published whole or not at all
//! - Bundler failures become compilations carrying the error, not panics

pub mod factory;
pub mod fs;
pub mod stats;
pub mod unit;
pub mod watcher;

use std::fmt;

use async_trait::async_trait;

use crate::config::TargetConfig;
use crate::error::BoxError;

pub use factory::create_compiler;
pub use fs::FsBundler;
pub use stats::{build_hash, Asset, BuildStats, Compilation, CompilationSummary};
pub use unit::{BuildStatus, CompilerUnit, TargetCompiler, TargetStatus};

/// The two build target roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    Client,
    Server,
}

impl TargetKind {
    /// The `name` a target configuration must carry for this role.
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Client => "client",
            TargetKind::Server => "server",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// External collaborator that compiles a single build target.
#[async_trait]
pub trait Bundler: Send + Sync + 'static {
    /// Compile `target` once.
    ///
    /// Compiler diagnostics belong in [`Compilation::errors`]; an `Err` means
    /// the bundler itself could not run and is recorded the same way.
    async fn compile(&self, target: &TargetConfig) -> Result<Compilation, BoxError>;
}
