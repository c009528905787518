//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::OrderError;
use store::StoreError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// The request carries no usable identity.
    Unauthorized(String),
    /// The caller may not perform the operation.
    Forbidden(String),
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Order placement or history error.
    Order(OrderError),
    /// Catalog store error.
    Store(StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Order(err) => order_error_to_response(err),
            ApiError::Store(err) => {
                let (status, message) = store_error_to_response(err);
                (status, "persistence", message)
            }
        };

        let body = serde_json::json!({ "error": message, "code": code });
        (status, axum::Json(body)).into_response()
    }
}

fn order_error_to_response(err: OrderError) -> (StatusCode, &'static str, String) {
    let code = err.kind();
    match err {
        OrderError::EmptyCart | OrderError::InvalidQuantity { .. } => {
            (StatusCode::BAD_REQUEST, code, err.to_string())
        }
        OrderError::ItemNotFound { .. } => (StatusCode::NOT_FOUND, code, err.to_string()),
        OrderError::InsufficientStock { .. } => (StatusCode::CONFLICT, code, err.to_string()),
        OrderError::Forbidden { .. } => (StatusCode::FORBIDDEN, code, err.to_string()),
        OrderError::Persistence(store_err) => {
            let (status, message) = store_error_to_response(store_err);
            (status, code, message)
        }
    }
}

fn store_error_to_response(err: StoreError) -> (StatusCode, String) {
    match &err {
        StoreError::ItemNotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        StoreError::StockOverflow(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        StoreError::LockTimeout(_) | StoreError::Deadlock => {
            (StatusCode::SERVICE_UNAVAILABLE, err.to_string())
        }
        _ => {
            tracing::error!(error = %err, "internal server error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    }
}

impl From<OrderError> for ApiError {
    fn from(err: OrderError) -> Self {
        ApiError::Order(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Store(err)
    }
}
