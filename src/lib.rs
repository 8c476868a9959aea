//! Potato leaf disease classification service.
//!
//! Accepts an uploaded leaf image, classifies it as early blight, late blight
//! or healthy with a pretrained model, and serves remediation advice.

pub mod classifier;
pub mod config;
pub mod error;
pub mod model;
pub mod preprocess;
pub mod routes;
pub mod solution;
pub mod state;
pub mod upload;
pub mod utils;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::{AppState, SharedState};

pub fn build_router(state: SharedState) -> Router {
    let body_limit_bytes = state.body_limit_bytes;

    Router::new()
        .route("/", get(routes::home))
        .route("/api/classify", post(routes::classify_handler))
        .route("/api/solution", post(routes::solution_handler))
        .route("/api/health", get(routes::health_check))
        .layer(DefaultBodyLimit::max(body_limit_bytes))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}
