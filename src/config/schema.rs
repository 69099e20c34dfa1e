//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the dev server
//! and the plugin options it registers with. All types derive Serde traits for
//! deserialization from config files.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration for the development server binary.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DevServerConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin endpoint settings.
    pub admin: AdminConfig,

    /// Source watching settings.
    pub watch: WatchConfig,

    /// Options handed to the plugin at registration.
    pub plugin: PluginOptions,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "127.0.0.1:3000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:3000".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (time until response headers) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Admin endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Mount `/__dev/*` admin endpoints.
    pub enabled: bool,

    /// Optional bearer token required by the admin endpoints.
    pub api_key: Option<String>,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: None,
        }
    }
}

/// Source watching configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct WatchConfig {
    /// Rebuild when watched sources change.
    pub enabled: bool,

    /// Directories or files to watch recursively.
    pub paths: Vec<PathBuf>,
}

/// Options recognized by [`crate::plugin::register`].
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PluginOptions {
    /// Client build target (required).
    pub client_config: Option<TargetConfig>,

    /// Server build target (optional; enables server rendering).
    pub server_config: Option<TargetConfig>,

    pub dev_middleware_options: DevMiddlewareOptions,

    pub hot_middleware_options: HotMiddlewareOptions,

    pub hot_server_middleware_options: HotServerMiddlewareOptions,
}

/// A single named build target.
///
/// Only `name` and `output` are interpreted here; every other key is kept in
/// `settings` for the bundler.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct TargetConfig {
    /// Target role: `client` or `server`.
    pub name: String,

    #[serde(default)]
    pub output: OutputConfig,

    /// Bundler-specific settings, passed through untouched.
    #[serde(flatten)]
    pub settings: serde_json::Map<String, serde_json::Value>,
}

impl TargetConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_public_path(mut self, public_path: impl Into<String>) -> Self {
        self.output.public_path = public_path.into();
        self
    }

    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output.path = path.into();
        self
    }

    pub fn with_setting(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.settings.insert(key.into(), value);
        self
    }
}

/// Output block of a build target.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory the target is emitted into.
    pub path: PathBuf,

    /// URL prefix the target's assets are served under.
    pub public_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("dist"),
            public_path: "/".to_string(),
        }
    }
}

/// Asset-serving middleware options.
///
/// Every field overrides the value derived from the client target when set.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct DevMiddlewareOptions {
    /// URL prefix for assets. Defaults to the client's `output.public_path`.
    pub public_path: Option<String>,

    /// Hold asset requests until the current build finishes. Defaults to `true`.
    pub wait_for_build: Option<bool>,

    /// File served for directory requests. Defaults to `index.html`.
    pub index: Option<String>,

    /// Extra headers added to every asset response.
    pub headers: BTreeMap<String, String>,

    /// Methods the middleware answers. Defaults to `GET` and `HEAD`.
    pub methods: Option<Vec<String>>,
}

/// Effective asset-serving settings after option resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct DevMiddlewareSettings {
    pub public_path: String,
    pub wait_for_build: bool,
    pub index: String,
    pub headers: BTreeMap<String, String>,
    pub methods: Vec<String>,
}

impl DevMiddlewareOptions {
    /// Merge these options over the defaults derived from the client target.
    ///
    /// Precedence: explicit option > `derived_public_path` > built-in default.
    pub fn resolve(&self, derived_public_path: &str) -> DevMiddlewareSettings {
        DevMiddlewareSettings {
            public_path: self
                .public_path
                .clone()
                .unwrap_or_else(|| derived_public_path.to_string()),
            wait_for_build: self.wait_for_build.unwrap_or(true),
            index: self.index.clone().unwrap_or_else(|| "index.html".to_string()),
            headers: self.headers.clone(),
            methods: self
                .methods
                .clone()
                .unwrap_or_else(|| vec!["GET".to_string(), "HEAD".to_string()])
                .into_iter()
                .map(|m| m.to_ascii_uppercase())
                .collect(),
        }
    }
}

/// Hot-update notification middleware options.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct HotMiddlewareOptions {
    /// Event stream endpoint.
    pub path: String,

    /// Heartbeat interval in milliseconds.
    pub heartbeat_ms: u64,

    /// Log build notifications.
    pub log: bool,
}

impl Default for HotMiddlewareOptions {
    fn default() -> Self {
        Self {
            path: "/__webpack_hmr".to_string(),
            heartbeat_ms: 10_000,
            log: true,
        }
    }
}

/// Server-render middleware options.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct HotServerMiddlewareOptions {
    /// Value handed to the server bundle's render factory.
    pub server_renderer_options: serde_json::Value,

    /// How long a render request waits for the first server build, in
    /// milliseconds. `0` fails immediately.
    pub initial_build_timeout_ms: u64,
}

impl Default for HotServerMiddlewareOptions {
    fn default() -> Self {
        Self {
            server_renderer_options: serde_json::Value::Object(Default::default()),
            initial_build_timeout_ms: 30_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dev_options_derive_public_path() {
        let settings = DevMiddlewareOptions::default().resolve("/assets/");
        assert_eq!(settings.public_path, "/assets/");
        assert!(settings.wait_for_build);
        assert_eq!(settings.index, "index.html");
        assert_eq!(settings.methods, vec!["GET", "HEAD"]);
    }

    #[test]
    fn test_dev_options_explicit_override() {
        let options = DevMiddlewareOptions {
            public_path: Some("/static/".into()),
            wait_for_build: Some(false),
            methods: Some(vec!["get".into()]),
            ..Default::default()
        };
        let settings = options.resolve("/assets/");
        assert_eq!(settings.public_path, "/static/");
        assert!(!settings.wait_for_build);
        assert_eq!(settings.methods, vec!["GET"]);
    }

    #[test]
    fn test_target_config_from_toml() {
        let config: TargetConfig = toml::from_str(
            r#"
            name = "client"
            command = ["npm", "run", "build:client"]

            [output]
            path = "build/client"
            public_path = "/assets/"
            "#,
        )
        .unwrap();

        assert_eq!(config.name, "client");
        assert_eq!(config.output.public_path, "/assets/");
        assert_eq!(config.output.path, PathBuf::from("build/client"));
        assert!(config.settings.contains_key("command"));
        assert!(!config.settings.contains_key("output"));
    }

    #[test]
    fn test_default_config() {
        let config = DevServerConfig::default();
        assert_eq!(config.listener.bind_address, "127.0.0.1:3000");
        assert_eq!(config.plugin.hot_middleware_options.path, "/__webpack_hmr");
        assert!(config.plugin.client_config.is_none());
    }
}
