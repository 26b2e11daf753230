//! Minimal HTTP surface for the pipeline daemon.
//!
//! The pipeline is a background service; the only thing it serves is a
//! health endpoint for deployment probes.

use axum::{extract::Extension, routing::get, Router};
use sqlx::PgPool;
use tower_http::trace::TraceLayer;

use super::routes::health::health_handler;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
}

pub fn build_app(db_pool: PgPool) -> Router {
    let state = AppState { db_pool };

    Router::new()
        .route("/health", get(health_handler))
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
}
