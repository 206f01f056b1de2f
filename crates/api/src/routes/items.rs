//! Item registry, balance, status and history endpoints.

use std::sync::Arc;

use alerts::{AlertStatus, ItemStatus};
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::{ItemId, Quantity};
use ledger::LedgerError;
use serde::{Deserialize, Serialize};
use stock_store::{EntryQuery, ItemRecord, ReasonCode, SequenceNumber, StockEntry, StockStore};

use super::AppState;
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct RegisterItemRequest {
    pub item_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub threshold: Option<i64>,
}

#[derive(Deserialize)]
pub struct SetThresholdRequest {
    pub threshold: Option<i64>,
}

#[derive(Deserialize, Default)]
pub struct ListItemsParams {
    #[serde(default)]
    pub below_threshold: bool,
}

#[derive(Deserialize, Default)]
pub struct HistoryParams {
    pub from_sequence: Option<i64>,
    pub limit: Option<usize>,
    pub reason: Option<ReasonCode>,
}

impl HistoryParams {
    fn is_unfiltered(&self) -> bool {
        self.from_sequence.is_none() && self.limit.is_none() && self.reason.is_none()
    }
}

// -- Response types --

#[derive(Serialize)]
pub struct ItemSummary {
    pub item_id: ItemId,
    pub name: Option<String>,
    pub balance: Quantity,
    pub threshold: Option<Quantity>,
    pub status: Option<AlertStatus>,
}

#[derive(Serialize)]
pub struct BalanceResponse {
    pub item_id: ItemId,
    pub balance: Quantity,
}

// -- Handlers --

/// GET /items — every item with its balance and alert status.
#[tracing::instrument(skip(state, params))]
pub async fn list<S: StockStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(params): Query<ListItemsParams>,
) -> Result<Json<Vec<ItemSummary>>, ApiError> {
    let mut summaries = Vec::new();

    for record in state.ledger.items().await {
        let summary = match state.evaluator().evaluate(&record.item_id).await {
            Ok(status) => ItemSummary {
                item_id: status.item_id,
                name: record.name,
                balance: status.balance,
                threshold: Some(status.threshold),
                status: Some(status.status),
            },
            Err(LedgerError::NoThresholdConfigured(_)) => ItemSummary {
                balance: state.ledger.balance(&record.item_id).await?,
                item_id: record.item_id,
                name: record.name,
                threshold: None,
                status: None,
            },
            Err(e) => return Err(e.into()),
        };

        if params.below_threshold && summary.status != Some(AlertStatus::Low) {
            continue;
        }
        summaries.push(summary);
    }

    Ok(Json(summaries))
}

/// POST /items — register an item or update its name and threshold.
#[tracing::instrument(skip(state, req), fields(item_id = %req.item_id))]
pub async fn register<S: StockStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<RegisterItemRequest>,
) -> Result<(StatusCode, Json<ItemRecord>), ApiError> {
    let item_id = ItemId::parse(&req.item_id)
        .ok_or_else(|| ApiError::BadRequest("item_id must not be empty".to_string()))?;

    let record = state
        .ledger
        .register_item(item_id, req.name, req.threshold.map(Quantity::new))
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// PUT /items/{id}/threshold — set or clear an item's own threshold.
#[tracing::instrument(skip(state, req))]
pub async fn set_threshold<S: StockStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<SetThresholdRequest>,
) -> Result<Json<ItemRecord>, ApiError> {
    let record = state
        .ledger
        .set_threshold(&ItemId::new(id), req.threshold.map(Quantity::new))
        .await?;
    Ok(Json(record))
}

/// GET /items/{id}/balance
#[tracing::instrument(skip(state))]
pub async fn balance<S: StockStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let item_id = ItemId::new(id);
    let balance = state.ledger.balance(&item_id).await?;
    Ok(Json(BalanceResponse { item_id, balance }))
}

/// GET /items/{id}/status
#[tracing::instrument(skip(state))]
pub async fn status<S: StockStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<ItemStatus>, ApiError> {
    Ok(Json(state.evaluator().evaluate(&ItemId::new(id)).await?))
}

/// GET /items/{id}/history — entries in sequence order, optionally filtered.
#[tracing::instrument(skip(state, params))]
pub async fn history<S: StockStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<StockEntry>>, ApiError> {
    let item_id = ItemId::new(id);

    if params.is_unfiltered() {
        return Ok(Json(state.ledger.history_entries(&item_id).await?));
    }

    let mut query = EntryQuery::for_item(item_id);
    if let Some(from) = params.from_sequence {
        query = query.from_sequence(SequenceNumber::new(from));
    }
    if let Some(reason) = params.reason {
        query = query.reason(reason);
    }
    if let Some(limit) = params.limit {
        query = query.limit(limit);
    }

    Ok(Json(state.ledger.query_history(query).await?))
}
