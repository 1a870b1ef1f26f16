//! # HTTP Push Adapter
//!
//! Exposes a [`DeliveryHandler`](crate::agents::DeliveryHandler) to push
//! subscriptions over HTTP.

pub mod errors;
pub mod handlers;
pub mod state;

pub use errors::{ApiError, ApiResult};
pub use state::AppState;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

/// Router with `POST /` for deliveries and `GET /health`
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", post(handlers::delivery::receive_push))
        .route("/health", get(handlers::health::basic_health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
