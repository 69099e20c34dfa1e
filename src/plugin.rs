//! Plugin registration: wires the compiler, interceptors and catch-all render
//! into a host router.
//!
//! # Data Flow
//! ```text
//! PluginOptions
//!     → create_compiler (client required, server optional)
//!     → DevMiddleware (public path derived from the client target)
//!     → HotMiddleware (client target only)
//!     → InterceptorChain [dev, hot] layered over the host router
//!     → catch-all render fallback (server target only)
//! ```
//!
//! `register` must be called from within a Tokio runtime: constructing the
//! middleware starts the build loop and the build followers.

use std::sync::Arc;

use axum::Router;

use crate::compiler::{create_compiler, Bundler, CompilerUnit, TargetKind};
use crate::config::PluginOptions;
use crate::error::PluginError;
use crate::middleware::{DevMiddleware, HotMiddleware, InterceptorChain};
use crate::render::{handler, HotServerMiddleware};

/// Handles kept by the host after registration.
#[derive(Clone)]
pub struct Registration {
    compiler: Arc<CompilerUnit>,
    hot: HotMiddleware,
    renderer: Option<Arc<HotServerMiddleware>>,
}

impl Registration {
    /// The compiler unit driving every build.
    pub fn compiler(&self) -> &Arc<CompilerUnit> {
        &self.compiler
    }

    pub fn is_client_only(&self) -> bool {
        self.renderer.is_none()
    }

    /// The server-render middleware, when a server target is configured.
    pub fn renderer(&self) -> Option<&Arc<HotServerMiddleware>> {
        self.renderer.as_ref()
    }

    pub fn hot(&self) -> &HotMiddleware {
        &self.hot
    }

    /// Stop the build loop after the current build.
    pub fn close(&self) {
        self.compiler.close();
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("compiler", &self.compiler)
            .field("client_only", &self.is_client_only())
            .finish()
    }
}

/// Register the plugin on `server`.
///
/// Fails before anything is installed when the target configuration is
/// invalid. Routes added to the returned router later are not intercepted.
pub fn register(
    server: Router,
    options: PluginOptions,
    bundler: Arc<dyn Bundler>,
) -> Result<(Router, Registration), PluginError> {
    let PluginOptions {
        client_config,
        server_config,
        dev_middleware_options,
        hot_middleware_options,
        hot_server_middleware_options,
    } = options;

    let compiler = create_compiler(bundler, client_config, server_config)?;

    let client = compiler
        .target(TargetKind::Client)
        .cloned()
        .ok_or_else(|| PluginError::InternalConsistency("compiler unit has no client target".to_string()))?;

    let settings = dev_middleware_options.resolve(&client.config().output.public_path);
    let dev = DevMiddleware::new(Arc::clone(&compiler), settings);
    let hot = HotMiddleware::new(client, hot_middleware_options);

    let mut chain = InterceptorChain::new();
    chain.install(Arc::new(dev)).install(Arc::new(hot.clone()));

    let (server, renderer) = if compiler.target(TargetKind::Server).is_some() {
        let renderer = HotServerMiddleware::new(&compiler, hot_server_middleware_options);
        (handler::install(server, Arc::clone(&renderer)), Some(renderer))
    } else {
        (server, None)
    };

    tracing::info!(
        middlewares = ?chain.names(),
        server_render = renderer.is_some(),
        hot_path = %hot.path(),
        "Plugin registered"
    );

    let server = chain.apply(server);
    Ok((
        server,
        Registration {
            compiler,
            hot,
            renderer,
        },
    ))
}
