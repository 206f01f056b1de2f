//! HTTP API server with observability for the stock ledger.
//!
//! Provides REST endpoints for recording stock entries, item balances and
//! low-stock alerts, receipts and bill-of-materials orders, with structured
//! logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use fulfillment::Catalog;
use ledger::Ledger;
use metrics_exporter_prometheus::PrometheusHandle;
use stock_store::StockStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: StockStore + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<S>))
        .route("/entries", post(routes::entries::record::<S>))
        .route(
            "/items",
            get(routes::items::list::<S>).post(routes::items::register::<S>),
        )
        .route(
            "/items/{id}/threshold",
            put(routes::items::set_threshold::<S>),
        )
        .route("/items/{id}/balance", get(routes::items::balance::<S>))
        .route("/items/{id}/status", get(routes::items::status::<S>))
        .route("/items/{id}/history", get(routes::items::history::<S>))
        .route("/alerts/low", get(routes::reports::low_stock::<S>))
        .route("/integrity", get(routes::reports::integrity::<S>))
        .route("/receipts", post(routes::orders::receive::<S>))
        .route("/orders", post(routes::orders::fulfill::<S>))
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

/// Opens the ledger over `store`, loads the catalog and registers its
/// materials.
pub async fn create_state<S: StockStore>(
    store: S,
    config: &Config,
) -> fulfillment::Result<Arc<AppState<S>>> {
    let catalog = match &config.catalog_path {
        Some(path) => {
            let catalog = Catalog::load(path)?;
            tracing::info!(path = %path.display(), "catalog loaded");
            catalog
        }
        None => Catalog::new(),
    };

    let ledger = Arc::new(Ledger::open(store, config.ledger).await?);
    let state = AppState::new(ledger, catalog, config.default_threshold);
    state.fulfillment.register_materials().await?;

    Ok(Arc::new(state))
}
