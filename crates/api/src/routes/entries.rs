//! Stock entry recording endpoint.

use std::sync::Arc;

use alerts::RecordedEntry;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use common::ItemId;
use ledger::NewStockEntry;
use stock_store::StockStore;

use super::AppState;
use crate::error::ApiError;

/// POST /entries — append one stock entry and report the item's status.
#[tracing::instrument(skip(state, entry), fields(item_id = %entry.item_id))]
pub async fn record<S: StockStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(mut entry): Json<NewStockEntry>,
) -> Result<(StatusCode, Json<RecordedEntry>), ApiError> {
    entry.item_id = ItemId::parse(entry.item_id.as_str())
        .ok_or_else(|| ApiError::BadRequest("item_id must not be empty".to_string()))?;

    let recorded = state.monitor.record(entry).await?;
    Ok((StatusCode::CREATED, Json(recorded)))
}
