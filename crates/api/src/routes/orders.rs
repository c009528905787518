//! Order placement and order history endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use domain::{CartLine, PlacedOrder};
use serde::{Deserialize, Serialize};
use store::{OrderRecord, Store};

use crate::AppState;
use crate::error::ApiError;
use crate::identity::Caller;

// -- Request types --

#[derive(Deserialize)]
pub struct PlaceOrderRequest {
    pub items: Vec<CartLine>,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub buyer_id: String,
    pub total_cents: i64,
    pub created_at: DateTime<Utc>,
    pub lines: Vec<OrderLineResponse>,
}

#[derive(Serialize)]
pub struct OrderLineResponse {
    pub item_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_name: Option<String>,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
}

impl From<PlacedOrder> for OrderResponse {
    fn from(placed: PlacedOrder) -> Self {
        Self {
            id: placed.order.id.to_string(),
            buyer_id: placed.order.buyer_id.to_string(),
            total_cents: placed.order.total.cents(),
            created_at: placed.order.created_at,
            lines: placed
                .lines
                .iter()
                .map(|line| OrderLineResponse {
                    item_id: line.item_id.to_string(),
                    item_name: None,
                    quantity: line.quantity,
                    unit_price_cents: line.unit_price.cents(),
                    line_total_cents: line.line_total().cents(),
                })
                .collect(),
        }
    }
}

impl From<OrderRecord> for OrderResponse {
    fn from(record: OrderRecord) -> Self {
        Self {
            id: record.order.id.to_string(),
            buyer_id: record.order.buyer_id.to_string(),
            total_cents: record.order.total.cents(),
            created_at: record.order.created_at,
            lines: record
                .lines
                .into_iter()
                .map(|line| OrderLineResponse {
                    line_total_cents: line.unit_price.multiply(line.quantity).cents(),
                    item_id: line.item_id.to_string(),
                    item_name: Some(line.item_name),
                    quantity: line.quantity,
                    unit_price_cents: line.unit_price.cents(),
                })
                .collect(),
        }
    }
}

// -- Handlers --

/// POST /orders: places an order for the caller.
#[tracing::instrument(skip_all, fields(user_id = %caller.0.user_id))]
pub async fn place<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    payload: Result<Json<PlaceOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let placed = state
        .orders
        .place_order(caller.0.user_id, req.items)
        .await?;

    Ok((StatusCode::CREATED, Json(placed.into())))
}

/// GET /orders: the caller's own orders, newest first.
pub async fn history<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(identity): Caller,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let records = state.orders.order_history(&identity).await?;
    Ok(Json(records.into_iter().map(Into::into).collect()))
}

/// GET /orders/all: every buyer's orders, newest first. Staff only.
pub async fn all<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(identity): Caller,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let records = state.orders.all_orders(&identity).await?;
    Ok(Json(records.into_iter().map(Into::into).collect()))
}
