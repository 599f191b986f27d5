//! JSON gateway consumed by the store dashboard.
//!
//! Handlers are stateless: each resolves its [`StoreInstance`] through the
//! [`Instances`] lookup injected as router state. There is no authentication
//! here; the gateway is meant to sit behind the platform's own network
//! boundary.
//!
//! [`StoreInstance`]: crate::instance::StoreInstance

pub mod error;
mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::instance::Instances;

pub use error::ApiError;

pub const API_PREFIX: &str = "/api/onoff_store";

#[derive(Debug, Default)]
pub struct AppState {
    pub instances: Instances,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/repos", get(handlers::list_repos))
        .route("/packages", get(handlers::list_packages))
        .route("/install", post(handlers::install))
        .route("/readme/{owner}/{repo}", get(handlers::readme))
        .route("/refresh", post(handlers::refresh))
        .route("/custom/add", post(handlers::add_custom))
        .route("/hide", post(handlers::hide))
        .route("/unhide", post(handlers::unhide))
        .route("/uninstall", post(handlers::uninstall))
}

/// The complete application with tracing and CORS layers.
pub fn build(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .nest(API_PREFIX, router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
