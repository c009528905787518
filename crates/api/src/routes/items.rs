//! Item catalog endpoints.
//!
//! Reads are open to any caller. Writes require the catalog capability and
//! wait for the row lock of any in-flight placement on the same item.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use common::{ItemId, Money};
use domain::Identity;
use serde::{Deserialize, Serialize};
use store::{InventoryItem, Store};

use crate::AppState;
use crate::error::ApiError;
use crate::identity::Caller;

// -- Request types --

#[derive(Deserialize)]
pub struct UpsertItemRequest {
    pub name: String,
    #[serde(default)]
    pub category: String,
    pub unit_price_cents: i64,
    pub quantity_on_hand: u32,
}

#[derive(Deserialize)]
pub struct SetPriceRequest {
    pub unit_price_cents: i64,
}

#[derive(Deserialize)]
pub struct RestockRequest {
    pub quantity: u32,
}

// -- Response types --

#[derive(Serialize)]
pub struct ItemResponse {
    pub id: String,
    pub name: String,
    pub category: String,
    pub unit_price_cents: i64,
    pub quantity_on_hand: u32,
}

impl From<InventoryItem> for ItemResponse {
    fn from(item: InventoryItem) -> Self {
        Self {
            id: item.id.to_string(),
            name: item.name,
            category: item.category,
            unit_price_cents: item.unit_price.cents(),
            quantity_on_hand: item.quantity_on_hand,
        }
    }
}

fn require_catalog_access(identity: &Identity) -> Result<(), ApiError> {
    if identity.can_manage_catalog() {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "Catalog changes require the staff role".to_string(),
        ))
    }
}

fn price_from_cents(cents: i64) -> Result<Money, ApiError> {
    if cents < 0 {
        return Err(ApiError::BadRequest(
            "unit_price_cents must not be negative".to_string(),
        ));
    }
    Ok(Money::from_cents(cents))
}

// -- Handlers --

/// GET /items: every item ordered by ID.
pub async fn list<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<ItemResponse>>, ApiError> {
    let items = state.store.list_items().await?;
    Ok(Json(items.into_iter().map(Into::into).collect()))
}

/// GET /items/{id}
pub async fn get<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<ItemResponse>, ApiError> {
    let item_id = ItemId::new(id);
    let item = state
        .store
        .get_item(&item_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Item {item_id} not found")))?;
    Ok(Json(item.into()))
}

/// PUT /items/{id}: creates or replaces an item.
#[tracing::instrument(skip_all, fields(item_id = %id, user_id = %caller.0.user_id))]
pub async fn upsert<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Path(id): Path<String>,
    payload: Result<Json<UpsertItemRequest>, JsonRejection>,
) -> Result<Json<ItemResponse>, ApiError> {
    require_catalog_access(&caller.0)?;
    let Json(req) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let item = InventoryItem::new(
        id,
        req.name,
        req.category,
        price_from_cents(req.unit_price_cents)?,
        req.quantity_on_hand,
    );
    state.store.upsert_item(item.clone()).await?;
    tracing::info!("item upserted");

    Ok(Json(item.into()))
}

/// PUT /items/{id}/price: changes the catalog price.
///
/// Orders already placed keep the price they were placed at.
#[tracing::instrument(skip_all, fields(item_id = %id, user_id = %caller.0.user_id))]
pub async fn set_price<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Path(id): Path<String>,
    payload: Result<Json<SetPriceRequest>, JsonRejection>,
) -> Result<Json<ItemResponse>, ApiError> {
    require_catalog_access(&caller.0)?;
    let Json(req) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let item = state
        .store
        .set_price(&ItemId::new(id), price_from_cents(req.unit_price_cents)?)
        .await?;
    tracing::info!(unit_price = %item.unit_price, "price changed");

    Ok(Json(item.into()))
}

/// POST /items/{id}/restock: adds units to the stock on hand.
#[tracing::instrument(skip_all, fields(item_id = %id, user_id = %caller.0.user_id))]
pub async fn restock<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Path(id): Path<String>,
    payload: Result<Json<RestockRequest>, JsonRejection>,
) -> Result<Json<ItemResponse>, ApiError> {
    require_catalog_access(&caller.0)?;
    let Json(req) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let item = state.store.restock(&ItemId::new(id), req.quantity).await?;
    tracing::info!(quantity_on_hand = item.quantity_on_hand, "item restocked");

    Ok(Json(item.into()))
}
