//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::response::IntoResponse;
use axum::Router;
use tower::ServiceExt;

use universal_dev_server::compiler::{Asset, Bundler, Compilation};
use universal_dev_server::config::{PluginOptions, TargetConfig};
use universal_dev_server::error::BoxError;
use universal_dev_server::render::{render_fn, Render, RenderFactory, RendererContext};
use universal_dev_server::Registration;

/// Bundler whose results are set by the test between builds.
///
/// The server renderer answers `"<label> gen=<generation> path=<path>"`.
#[derive(Default)]
pub struct ScriptedBundler {
    pub server_error: Mutex<Option<String>>,
    pub label: Mutex<String>,
    pub delay: Mutex<Duration>,
    pub compiles: AtomicUsize,
    pub renders: Arc<AtomicUsize>,
}

impl ScriptedBundler {
    pub fn new(label: &str) -> Arc<Self> {
        let bundler = Self::default();
        *bundler.label.lock().unwrap() = label.to_string();
        Arc::new(bundler)
    }

    pub fn fail_server(&self, error: &str) {
        *self.server_error.lock().unwrap() = Some(error.to_string());
    }

    pub fn succeed_with(&self, label: &str) {
        *self.server_error.lock().unwrap() = None;
        *self.label.lock().unwrap() = label.to_string();
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn compiles(&self) -> usize {
        self.compiles.load(Ordering::SeqCst)
    }

    pub fn renders(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }

    fn factory(&self) -> Arc<dyn RenderFactory> {
        let label = self.label.lock().unwrap().clone();
        let renders = Arc::clone(&self.renders);
        Arc::new(move |ctx: &RendererContext| -> Result<Arc<dyn Render>, BoxError> {
            let label = label.clone();
            let renders = Arc::clone(&renders);
            let generation = ctx.generation;
            Ok(render_fn(move |req: Request<Body>| {
                renders.fetch_add(1, Ordering::SeqCst);
                let body = format!("{label} gen={generation} path={}", req.uri().path());
                async move { Ok(([("content-type", "text/html")], body).into_response()) }
            }))
        })
    }
}

#[async_trait]
impl Bundler for ScriptedBundler {
    async fn compile(&self, target: &TargetConfig) -> Result<Compilation, BoxError> {
        self.compiles.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match target.name.as_str() {
            "server" => {
                if let Some(error) = self.server_error.lock().unwrap().clone() {
                    return Ok(Compilation::failed("server", error));
                }
                Ok(Compilation::new("server").with_renderer(self.factory()))
            }
            _ => Ok(Compilation::new("client")
                .with_asset("main.js", Asset::new("console.log('client')", "application/javascript"))),
        }
    }
}

pub fn client_config() -> TargetConfig {
    TargetConfig::new("client").with_public_path("/assets/")
}

pub fn server_config() -> TargetConfig {
    TargetConfig::new("server")
}

pub fn options(server: bool) -> PluginOptions {
    PluginOptions {
        client_config: Some(client_config()),
        server_config: server.then(server_config),
        ..Default::default()
    }
}

pub async fn send(app: &Router, method: Method, uri: &str) -> (StatusCode, String) {
    let request = Request::builder().method(method).uri(uri).body(Body::empty()).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

pub async fn get(app: &Router, uri: &str) -> (StatusCode, String) {
    send(app, Method::GET, uri).await
}

/// Wait until the published render snapshot reaches `generation`.
pub async fn wait_for_render_generation(registration: &Registration, generation: u64) {
    let renderer = registration.renderer().expect("server target configured");
    tokio::time::timeout(Duration::from_secs(5), async {
        while renderer.current().generation < generation {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("render snapshot published in time");
}

/// Request a rebuild and wait until its render snapshot is published.
pub async fn rebuild(registration: &Registration) {
    let next = registration.compiler().last_stats().map_or(1, |s| s.generation + 1);
    registration.compiler().invalidate();
    wait_for_render_generation(registration, next).await;
}
