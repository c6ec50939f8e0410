//! HTTP API server with observability for the goods reservation service.
//!
//! Exposes the reservation orchestrator over REST, with structured logging
//! (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use reservation::ReservationService;
use stock_store::StockStorage;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use routes::reservations::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: StockStorage + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/reserve/order/goods", post(routes::reservations::reserve::<S>))
        .route(
            "/unreserve/goods/{order_id}",
            delete(routes::reservations::unreserve::<S>),
        )
        .route(
            "/check/reserve/status/{order_id}",
            get(routes::reservations::status::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state around a storage, applying the configured
/// operation deadline.
pub fn create_state<S: StockStorage>(storage: S, config: &Config) -> Arc<AppState<S>> {
    let service = ReservationService::new(storage);
    let service = match config.operation_timeout {
        Some(timeout) => service.with_timeout(timeout),
        None => service,
    };
    Arc::new(AppState::new(service))
}
