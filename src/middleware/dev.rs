//! Asset-serving middleware.
//!
//! # Responsibilities
//! - Start the compiler's watch loop (the first build) when constructed
//! - Answer requests under the public path with the latest built asset
//! - Hold asset requests while a build is running, when configured to
//!
//! # Design Decisions
//! - Only the client compilation is served; server output stays private
//! - Request paths are percent-decoded before lookup
//! - A miss lets the request continue to the next interceptor and the routes

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, StatusCode};
use axum::response::Response;

use crate::compiler::{Asset, CompilerUnit, TargetKind};
use crate::config::DevMiddlewareSettings;
use crate::middleware::{Done, Middleware, RequestContext};

/// Serves built assets from the compiler unit's latest generation.
#[derive(Clone)]
pub struct DevMiddleware {
    unit: Arc<CompilerUnit>,
    settings: Arc<DevMiddlewareSettings>,
    prefix: Arc<str>,
}

impl DevMiddleware {
    /// Bind to `unit` and start its watch loop. Must be called from within a
    /// Tokio runtime.
    pub fn new(unit: Arc<CompilerUnit>, settings: DevMiddlewareSettings) -> Self {
        let prefix: Arc<str> = normalize_public_path(&settings.public_path).into();

        if unit.watch() {
            tracing::info!(public_path = %prefix, wait_for_build = settings.wait_for_build, "Serving built assets");
        }

        Self {
            unit,
            settings: Arc::new(settings),
            prefix,
        }
    }

    /// The asset key a request path maps to, if it lies under the public path.
    ///
    /// Paths that do not decode to UTF-8 map to nothing.
    fn asset_key(&self, path: &str) -> Option<String> {
        let relative = if path == self.prefix.trim_end_matches('/') {
            ""
        } else {
            path.strip_prefix(&*self.prefix)?
        };
        let relative = urlencoding::decode(relative).ok()?;

        if relative.is_empty() || relative.ends_with('/') {
            Some(format!("{relative}{}", self.settings.index))
        } else {
            Some(relative.to_string())
        }
    }

    fn allows(&self, method: &Method) -> bool {
        self.settings.methods.iter().any(|m| m == method.as_str())
    }

    fn asset_response(&self, asset: &Asset, head: bool) -> Result<Response, axum::http::Error> {
        let mut builder = Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, asset.content_type.as_str())
            .header(header::CONTENT_LENGTH, asset.content.len())
            .header(header::CACHE_CONTROL, "no-cache");

        for (name, value) in &self.settings.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let body = if head {
            Body::empty()
        } else {
            Body::from(asset.content.clone())
        };
        builder.body(body)
    }
}

impl Middleware for DevMiddleware {
    fn name(&self) -> &'static str {
        "dev"
    }

    fn call(&self, request: RequestContext, done: Done) {
        if !self.allows(&request.method) {
            return done.next();
        }
        let Some(key) = self.asset_key(request.path()) else {
            return done.next();
        };

        let this = self.clone();
        tokio::spawn(async move {
            let stats = if this.settings.wait_for_build {
                this.unit.wait_until_done().await
            } else {
                this.unit.last_stats()
            };
            let Some(stats) = stats else {
                return done.next();
            };

            let client = stats.get(TargetKind::Client.as_str());
            let Some(asset) = client.and_then(|c| c.asset(&key)) else {
                return done.next();
            };

            tracing::trace!(asset = %key, generation = stats.generation, "Serving asset");
            match this.asset_response(asset, request.method == Method::HEAD) {
                Ok(response) => done.respond(response),
                Err(e) => done.fail(e),
            }
        });
    }
}

/// Reduce a public path to an absolute URL path ending in `/`.
///
/// Absolute URLs (`http://host/assets/`, `//cdn/assets/`) keep only their path.
fn normalize_public_path(public_path: &str) -> String {
    let without_origin = match public_path.find("://") {
        Some(i) => strip_host(&public_path[i + 3..]),
        None => match public_path.strip_prefix("//") {
            Some(rest) => strip_host(rest),
            None => public_path,
        },
    };

    let mut path = String::with_capacity(without_origin.len() + 2);
    if !without_origin.starts_with('/') {
        path.push('/');
    }
    path.push_str(without_origin);
    if !path.ends_with('/') {
        path.push('/');
    }
    path
}

fn strip_host(rest: &str) -> &str {
    rest.find('/').map(|i| &rest[i..]).unwrap_or("/")
}
