// Module: http
// HTTP/JSON REST API

pub mod error;
pub mod health;
pub mod providers;
pub mod proxy;
pub mod sources;

use axum::{
    routing::{get, post},
    Router,
};
use sourcetv_core::{bootstrap::Services, Config};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use error::{AppError, AppResult};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub services: Services,
    pub config: Arc<Config>,
}

impl AppState {
    #[must_use]
    pub fn new(services: Services, config: Arc<Config>) -> Self {
        Self { services, config }
    }
}

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check endpoint (for monitoring)
        .merge(health::create_health_router())
        // Media proxy
        .merge(proxy::create_proxy_router())
        // Source resolution
        .route("/api/sources/movie/{id}", get(sources::movie_sources))
        .route(
            "/api/sources/tv/{id}/{season}/{episode}",
            get(sources::tv_sources),
        )
        // Provider administration
        .route("/api/providers", get(providers::list_providers))
        .route("/api/providers/{id}/enable", post(providers::enable_provider))
        .route("/api/providers/{id}/disable", post(providers::disable_provider))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
