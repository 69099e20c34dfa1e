//! Universal (client + server) bundle development server plugin for axum.

pub mod admin;
pub mod compiler;
pub mod config;
pub mod error;
pub mod middleware;
pub mod observability;
pub mod plugin;
pub mod render;

pub use compiler::{create_compiler, Bundler, CompilerUnit, FsBundler};
pub use config::schema::{DevServerConfig, PluginOptions, TargetConfig};
pub use error::{ConfigurationError, PluginError, RequestError};
pub use plugin::{register, Registration};
