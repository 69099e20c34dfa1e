//! Logging and metrics for the dev server.
//!
//! # Data Flow
//! ```text
//! compiler, middleware, render handler
//!     → logging.rs (tracing events to stdout, RUST_LOG overrides the config level)
//!     → metrics.rs (build, render and hot-client metrics)
//!     → Prometheus scrape listener when observability.metrics_enabled is set
//! ```
//!
//! Request IDs and per-request spans are added by tower-http layers in the
//! binary, not here.

pub mod logging;
pub mod metrics;
