//! Prometheus metrics endpoint.

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use metrics::Unit;
use metrics_exporter_prometheus::PrometheusHandle;

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Registers descriptions for the metrics recorded by the order service.
///
/// Call once after the recorder is installed.
pub fn describe() {
    metrics::describe_counter!("orders_placed_total", "Orders committed");
    metrics::describe_counter!(
        "order_placement_failures_total",
        "Placements rejected or rolled back, by reason"
    );
    metrics::describe_histogram!(
        "order_placement_duration_seconds",
        Unit::Seconds,
        "Time from cart validation to commit"
    );
    metrics::describe_counter!(
        "audit_write_failures_total",
        "Audit entries that could not be recorded after a commit"
    );
}

/// GET /metrics returns Prometheus-formatted metrics.
pub async fn get(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)],
        handle.render(),
    )
}
