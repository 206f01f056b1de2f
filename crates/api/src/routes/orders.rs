//! Receipts by material name and bill-of-materials orders.

use std::sync::Arc;

use alerts::RecordedEntry;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use common::Timestamp;
use fulfillment::{FulfilledOrder, Order};
use serde::Deserialize;
use stock_store::StockStore;

use super::AppState;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct ReceiptRequest {
    pub material_name: String,
    pub quantity: i64,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub timestamp: Option<Timestamp>,
}

/// POST /receipts — receive stock of a catalog material.
#[tracing::instrument(skip(state, req), fields(material = %req.material_name))]
pub async fn receive<S: StockStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<ReceiptRequest>,
) -> Result<(StatusCode, Json<RecordedEntry>), ApiError> {
    let recorded = state
        .fulfillment
        .receive(&req.material_name, req.quantity, req.reference, req.timestamp)
        .await?;
    Ok((StatusCode::CREATED, Json(recorded)))
}

/// POST /orders — consume the materials of an order, all-or-nothing.
#[tracing::instrument(skip(state, order), fields(order_id = %order.order_id))]
pub async fn fulfill<S: StockStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(order): Json<Order>,
) -> Result<(StatusCode, Json<FulfilledOrder>), ApiError> {
    if order.order_id.trim().is_empty() {
        return Err(ApiError::BadRequest("order_id must not be empty".to_string()));
    }
    if order.items.is_empty() {
        return Err(ApiError::BadRequest("order has no items".to_string()));
    }

    let fulfilled = state.fulfillment.fulfill(order).await?;
    Ok((StatusCode::CREATED, Json(fulfilled)))
}
