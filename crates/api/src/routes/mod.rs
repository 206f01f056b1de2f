//! HTTP handlers and the state they share.

pub mod entries;
pub mod health;
pub mod items;
pub mod metrics;
pub mod orders;
pub mod reports;

use std::sync::Arc;

use alerts::{AlertEvaluator, StockMonitor, ThresholdTable};
use common::Quantity;
use fulfillment::{Catalog, FulfillmentService};
use ledger::Ledger;
use stock_store::StockStore;

/// Shared application state accessible from all handlers.
pub struct AppState<S: StockStore> {
    pub ledger: Arc<Ledger<S>>,
    pub monitor: StockMonitor<S, ThresholdTable>,
    pub fulfillment: FulfillmentService<S, ThresholdTable>,
}

impl<S: StockStore> AppState<S> {
    /// Wires the evaluator, monitor and fulfillment service around a ledger.
    ///
    /// Thresholds resolve from the catalog's per-item values over
    /// `default_threshold`.
    pub fn new(ledger: Arc<Ledger<S>>, catalog: Catalog, default_threshold: Option<Quantity>) -> Self {
        let thresholds = catalog.threshold_table(default_threshold);
        let evaluator = Arc::new(AlertEvaluator::new(ledger.clone(), thresholds));
        let monitor = StockMonitor::new(evaluator);
        let fulfillment = FulfillmentService::new(monitor.clone(), Arc::new(catalog));

        Self {
            ledger,
            monitor,
            fulfillment,
        }
    }

    pub fn evaluator(&self) -> &AlertEvaluator<S, ThresholdTable> {
        self.monitor.evaluator()
    }
}
