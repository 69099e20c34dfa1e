//! Reference bundler: runs an external build command and collects its output.
//!
//! Per-target settings (all optional):
//! - `command`: argv of the build step, run in the bundler's root directory
//! - `template`: server target only, the emitted HTML file rendered per request
//!
//! The server target exports a [`TemplateRenderFactory`] when its template was
//! emitted. The template may use `{{url}}`, `{{generation}}` and `{{scripts}}`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use axum::response::{Html, IntoResponse, Response};
use serde::Deserialize;
use tokio::process::Command;
use walkdir::WalkDir;

use crate::compiler::{Asset, Bundler, Compilation, TargetKind};
use crate::config::TargetConfig;
use crate::error::BoxError;
use crate::render::{Render, RenderFactory, RendererContext};

const DEFAULT_TEMPLATE: &str = "index.html";

/// Bundler-specific keys read from [`TargetConfig::settings`].
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct FsTargetSettings {
    pub command: Option<Vec<String>>,
    pub template: Option<String>,
}

impl FsTargetSettings {
    pub fn from_target(target: &TargetConfig) -> Result<Self, serde_json::Error> {
        serde_json::from_value(serde_json::Value::Object(target.settings.clone()))
    }
}

/// Builds targets with shell commands and reads their output directories.
#[derive(Debug, Clone)]
pub struct FsBundler {
    root: PathBuf,
}

impl FsBundler {
    /// Relative output paths and commands resolve against `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    async fn run_command(&self, target: &str, command: &[String]) -> Result<Vec<String>, BoxError> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| format!("{target}: `command` must not be empty"))?;

        tracing::debug!(target_name = target, command = ?command, "Running build command");
        let output = Command::new(program)
            .args(args)
            .current_dir(&self.root)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| format!("{target}: failed to run `{program}`: {e}"))?;

        if output.status.success() {
            return Ok(Vec::new());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let mut errors: Vec<String> = stderr
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect();
        if errors.is_empty() {
            errors.push(format!("`{program}` exited with {}", output.status));
        }
        Ok(errors)
    }
}

#[async_trait]
impl Bundler for FsBundler {
    async fn compile(&self, target: &TargetConfig) -> Result<Compilation, BoxError> {
        let settings = FsTargetSettings::from_target(target)?;
        let mut compilation = Compilation::new(target.name.clone());

        if let Some(command) = &settings.command {
            compilation.errors = self.run_command(&target.name, command).await?;
            if compilation.has_errors() {
                return Ok(compilation);
            }
        }

        let dir = self.root.join(&target.output.path);
        compilation.assets = tokio::task::spawn_blocking(move || collect_assets(&dir)).await??;

        if target.name == TargetKind::Server.as_str() {
            let template = settings.template.as_deref().unwrap_or(DEFAULT_TEMPLATE);
            match compilation.asset(template) {
                Some(asset) => {
                    let factory = TemplateRenderFactory::new(String::from_utf8_lossy(&asset.content).into_owned());
                    compilation.renderer = Some(Arc::new(factory));
                }
                None => compilation
                    .warnings
                    .push(format!("template `{template}` was not emitted; server rendering disabled")),
            }
        }

        Ok(compilation)
    }
}

/// Read every file under `dir`, keyed by its `/`-separated relative path.
fn collect_assets(dir: &Path) -> Result<BTreeMap<String, Asset>, BoxError> {
    if !dir.is_dir() {
        return Err(format!("output directory `{}` does not exist", dir.display()).into());
    }

    let mut assets = BTreeMap::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry.path().strip_prefix(dir)?;
        let key = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let content = std::fs::read(entry.path())?;
        assets.insert(key.clone(), Asset::new(content, determine_content_type(&key)));
    }

    Ok(assets)
}

/// Determine content type from file extension.
pub fn determine_content_type(path: &str) -> &'static str {
    let extension = Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("");

    match extension {
        "wasm" => "application/wasm",
        "js" | "mjs" => "application/javascript",
        "json" | "map" => "application/json",
        "html" => "text/html; charset=utf-8",
        "css" => "text/css",
        "txt" => "text/plain; charset=utf-8",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "ico" => "image/x-icon",
        "svg" => "image/svg+xml",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        _ => "application/octet-stream",
    }
}

/// Render export of a template-based server build.
#[derive(Debug, Clone)]
pub struct TemplateRenderFactory {
    template: Arc<str>,
}

impl TemplateRenderFactory {
    pub fn new(template: impl Into<Arc<str>>) -> Self {
        Self {
            template: template.into(),
        }
    }
}

impl RenderFactory for TemplateRenderFactory {
    fn create(&self, context: &RendererContext) -> Result<Arc<dyn Render>, BoxError> {
        let scripts = context
            .client_stats
            .as_ref()
            .map(|client| {
                let prefix = if client.public_path.ends_with('/') {
                    client.public_path.clone()
                } else {
                    format!("{}/", client.public_path)
                };
                client
                    .assets
                    .keys()
                    .filter(|path| path.ends_with(".js"))
                    .map(|path| format!(r#"<script src="{prefix}{path}"></script>"#))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default();

        // Everything but the URL is fixed for the lifetime of this generation.
        let page = self
            .template
            .replace("{{generation}}", &context.generation.to_string())
            .replace("{{scripts}}", &scripts);

        Ok(Arc::new(TemplateRenderer { page }))
    }
}

/// Renders one generation's template for a request URL.
#[derive(Debug)]
pub struct TemplateRenderer {
    page: String,
}

#[async_trait]
impl Render for TemplateRenderer {
    async fn render(&self, request: Request<Body>) -> Result<Response, BoxError> {
        let url = request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        Ok(Html(self.page.replace("{{url}}", &escape_html(url))).into_response())
    }
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, path: &str, content: &str) {
        let path = dir.join(path);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_content_types() {
        assert_eq!(determine_content_type("main.js"), "application/javascript");
        assert_eq!(determine_content_type("img/logo.svg"), "image/svg+xml");
        assert_eq!(determine_content_type("index.html"), "text/html; charset=utf-8");
        assert_eq!(determine_content_type("LICENSE"), "application/octet-stream");
    }

    #[test]
    fn test_settings_ignore_unknown_keys() {
        let target = TargetConfig::new("server")
            .with_setting("template", serde_json::json!("page.html"))
            .with_setting("mode", serde_json::json!("development"));
        let settings = FsTargetSettings::from_target(&target).unwrap();
        assert_eq!(settings.template.as_deref(), Some("page.html"));
        assert!(settings.command.is_none());
    }

    #[tokio::test]
    async fn test_collects_client_assets() {
        let root = TempDir::new().unwrap();
        write(root.path(), "dist/client/main.js", "console.log(1)");
        write(root.path(), "dist/client/css/app.css", "body{}");

        let bundler = FsBundler::new(root.path());
        let target = TargetConfig::new("client").with_output_path("dist/client");
        let compilation = bundler.compile(&target).await.unwrap();

        assert!(!compilation.has_errors());
        assert!(compilation.renderer.is_none());
        let keys: Vec<_> = compilation.assets.keys().cloned().collect();
        assert_eq!(keys, vec!["css/app.css", "main.js"]);
        assert_eq!(compilation.asset("css/app.css").unwrap().content_type, "text/css");
    }

    #[tokio::test]
    async fn test_missing_output_dir_is_error() {
        let root = TempDir::new().unwrap();
        let bundler = FsBundler::new(root.path());
        let err = bundler
            .compile(&TargetConfig::new("client").with_output_path("nowhere"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[tokio::test]
    async fn test_failing_command_reports_stderr() {
        let root = TempDir::new().unwrap();
        let bundler = FsBundler::new(root.path());
        let target = TargetConfig::new("client").with_setting(
            "command",
            serde_json::json!(["sh", "-c", "echo 'Module not found: ./App' >&2; exit 1"]),
        );

        let compilation = bundler.compile(&target).await.unwrap();
        assert_eq!(compilation.errors, vec!["Module not found: ./App"]);
    }

    #[tokio::test]
    async fn test_server_template_renderer() {
        let root = TempDir::new().unwrap();
        write(
            root.path(),
            "dist/server/index.html",
            "<p>{{url}} #{{generation}}</p>{{scripts}}",
        );

        let bundler = FsBundler::new(root.path());
        let server = bundler
            .compile(&TargetConfig::new("server").with_output_path("dist/server"))
            .await
            .unwrap();
        let factory = server.renderer.clone().expect("server exports a renderer");

        let mut client = Compilation::new("client").with_asset("main.js", Asset::new("", "application/javascript"));
        client.public_path = "/assets".to_string();

        let renderer = factory
            .create(&RendererContext {
                generation: 7,
                client_stats: Some(Arc::new(client)),
                server_stats: Arc::new(server),
                options: serde_json::Value::Null,
            })
            .unwrap();

        let response = renderer
            .render(Request::builder().uri("/posts?q=a&b=1").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(
            std::str::from_utf8(&body).unwrap(),
            r#"<p>/posts?q=a&amp;b=1 #7</p><script src="/assets/main.js"></script>"#
        );
    }

    #[tokio::test]
    async fn test_server_without_template_warns() {
        let root = TempDir::new().unwrap();
        write(root.path(), "dist/server/bundle.js", "");

        let bundler = FsBundler::new(root.path());
        let server = bundler
            .compile(&TargetConfig::new("server").with_output_path("dist/server"))
            .await
            .unwrap();
        assert!(server.renderer.is_none());
        assert_eq!(server.warnings.len(), 1);
    }
}
