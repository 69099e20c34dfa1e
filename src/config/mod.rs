//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! devserver.toml
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → DevServerConfig (validated, immutable)
//!     → PluginOptions handed to plugin::register
//!
//! Target name checks (client/server) are not done here; they belong to the
//! compiler factory so that programmatic callers get the same guarantees.
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Middleware options use `Option` fields so explicit values can be told
//!   apart from derived defaults
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::{
    AdminConfig, DevMiddlewareOptions, DevMiddlewareSettings, DevServerConfig,
    HotMiddlewareOptions, HotServerMiddlewareOptions, ListenerConfig, ObservabilityConfig,
    OutputConfig, PluginOptions, TargetConfig, WatchConfig,
};
pub use loader::{load_config, parse_config, ConfigError};
