//! HTTP API server with observability for the retail order backend.
//!
//! Provides REST endpoints for order placement, order history and the item
//! catalog, with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod identity;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use domain::OrderService;
use metrics_exporter_prometheus::PrometheusHandle;
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state accessible from all handlers.
pub struct AppState<S: Store> {
    pub orders: OrderService<S>,
    pub store: S,
    /// Name of the store backend, reported by the health check.
    pub backend: &'static str,
}

impl<S: Store + Clone> AppState<S> {
    pub fn new(store: S, backend: &'static str) -> Self {
        Self {
            orders: OrderService::new(store.clone()),
            store,
            backend,
        }
    }
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<S>))
        .route(
            "/orders",
            post(routes::orders::place::<S>).get(routes::orders::history::<S>),
        )
        .route("/orders/all", get(routes::orders::all::<S>))
        .route("/items", get(routes::items::list::<S>))
        .route(
            "/items/{id}",
            get(routes::items::get::<S>).put(routes::items::upsert::<S>),
        )
        .route("/items/{id}/price", put(routes::items::set_price::<S>))
        .route("/items/{id}/restock", post(routes::items::restock::<S>))
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
