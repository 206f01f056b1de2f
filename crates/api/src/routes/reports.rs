//! Low-stock report and ledger integrity endpoints.

use std::sync::Arc;

use alerts::LowStockItem;
use axum::Json;
use axum::extract::State;
use ledger::IntegrityReport;
use stock_store::StockStore;

use super::AppState;
use crate::error::ApiError;

/// GET /alerts/low — every LOW item, ordered by item id.
#[tracing::instrument(skip(state))]
pub async fn low_stock<S: StockStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<LowStockItem>>, ApiError> {
    Ok(Json(state.evaluator().low_stock_report_all().await?))
}

/// GET /integrity — replay every item's history against its cached balance.
#[tracing::instrument(skip(state))]
pub async fn integrity<S: StockStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<IntegrityReport>, ApiError> {
    Ok(Json(state.ledger.verify_integrity().await?))
}
