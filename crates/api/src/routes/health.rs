//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Serialize;
use stock_store::StockStore;

use super::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub items: usize,
}

/// GET /health — liveness plus the number of items the ledger tracks.
pub async fn check<S: StockStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        items: state.ledger.item_ids().await.len(),
    })
}
