//! Development admin endpoints.
//!
//! - `GET /__dev/status`: build state and per-target summaries
//! - `POST /__dev/rebuild`: request a rebuild

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use self::auth::{admin_auth_middleware, AdminAuth};
use self::handlers::{get_status, post_rebuild};
use crate::compiler::CompilerUnit;
use crate::config::AdminConfig;

pub fn setup_admin_router(unit: Arc<CompilerUnit>, config: &AdminConfig) -> Router {
    let auth = AdminAuth::new(config.api_key.clone());

    Router::new()
        .route("/__dev/status", get(get_status))
        .route("/__dev/rebuild", post(post_rebuild))
        .layer(middleware::from_fn_with_state(auth, admin_auth_middleware))
        .with_state(unit)
}
