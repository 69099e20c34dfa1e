//! Universal dev server.
//!
//! Serves a client bundle with hot-update notifications and, when a server
//! target is configured, renders every unmatched GET with the latest server
//! bundle.
//!
//! ```text
//!     Browser request
//!     ─────────────────▶ TraceLayer / request id / timeout
//!                            │
//!                            ▼
//!                      interceptor chain ──▶ dev (built assets)
//!                            │          ──▶ hot (/__webpack_hmr SSE)
//!                            ▼
//!                      host routes (/__dev/*)
//!                            │
//!                            ▼
//!                      catch-all render ◀── latest server build
//!
//!     sources ──▶ watcher ──▶ CompilerUnit::invalidate ──▶ FsBundler
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use clap::Parser;
use tokio::net::TcpListener;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use universal_dev_server::admin::setup_admin_router;
use universal_dev_server::compiler::watcher::SourceWatcher;
use universal_dev_server::config::{load_config, DevServerConfig};
use universal_dev_server::observability::{logging, metrics};
use universal_dev_server::{register, FsBundler};

#[derive(Parser)]
#[command(name = "universal-dev-server", version, about)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "devserver.toml")]
    config: PathBuf,

    /// Directory build commands run in and output paths resolve against
    #[arg(long, default_value = ".")]
    root: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(&args.config)?;

    logging::init(&config.observability.log_level);
    tracing::info!(config = %args.config.display(), "universal-dev-server v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        watch = config.watch.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let bundler = Arc::new(FsBundler::new(&args.root));
    let (app, registration) = register(Router::new(), config.plugin.clone(), bundler)?;
    let unit = Arc::clone(registration.compiler());

    // Kept alive until shutdown.
    let _watcher = if config.watch.enabled {
        let paths = config.watch.paths.iter().map(|p| args.root.join(p)).collect();
        Some(SourceWatcher::new(paths, unit).run()?)
    } else {
        None
    };

    let app = build_app(app, &config, &registration);

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    registration.close();
    tracing::info!("Shutdown complete");
    Ok(())
}

#[allow(deprecated)]
fn build_app(app: Router, config: &DevServerConfig, registration: &universal_dev_server::Registration) -> Router {
    let app = if config.admin.enabled {
        app.merge(setup_admin_router(Arc::clone(registration.compiler()), &config.admin))
    } else {
        app
    };

    app.layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
