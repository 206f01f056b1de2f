//! Append-then-evaluate composition.

use std::sync::Arc;

use ledger::{AppendReceipt, Ledger, LedgerError, NewStockEntry, Result};
use serde::Serialize;
use stock_store::StockStore;

use crate::evaluator::{AlertEvaluator, AlertStatus};
use crate::threshold::ThresholdSource;

/// An accepted entry together with the item's status right after it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordedEntry {
    #[serde(flatten)]
    pub receipt: AppendReceipt,

    /// Absent when no threshold is configured for the item.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AlertStatus>,
}

/// Records stock entries and re-derives the alert status of every item
/// they touch.
pub struct StockMonitor<S: StockStore, T: ThresholdSource> {
    evaluator: Arc<AlertEvaluator<S, T>>,
}

impl<S: StockStore, T: ThresholdSource> Clone for StockMonitor<S, T> {
    fn clone(&self) -> Self {
        Self {
            evaluator: self.evaluator.clone(),
        }
    }
}

impl<S: StockStore, T: ThresholdSource> StockMonitor<S, T> {
    pub fn new(evaluator: Arc<AlertEvaluator<S, T>>) -> Self {
        Self { evaluator }
    }

    pub fn evaluator(&self) -> &AlertEvaluator<S, T> {
        &self.evaluator
    }

    pub fn ledger(&self) -> &Arc<Ledger<S>> {
        self.evaluator.ledger()
    }

    /// Appends one entry and evaluates the item against the balance the
    /// append produced.
    #[tracing::instrument(skip(self, entry), fields(item_id = %entry.item_id))]
    pub async fn record(&self, entry: NewStockEntry) -> Result<RecordedEntry> {
        let receipt = self.ledger().append(entry).await?;
        self.evaluate_receipt(receipt).await
    }

    /// Appends a batch all-or-nothing and evaluates every resulting receipt.
    #[tracing::instrument(skip(self, entries), fields(entries = entries.len()))]
    pub async fn record_batch(&self, entries: Vec<NewStockEntry>) -> Result<Vec<RecordedEntry>> {
        let receipts = self.ledger().append_batch(entries).await?;

        let mut recorded = Vec::with_capacity(receipts.len());
        for receipt in receipts {
            recorded.push(self.evaluate_receipt(receipt).await?);
        }
        Ok(recorded)
    }

    async fn evaluate_receipt(&self, receipt: AppendReceipt) -> Result<RecordedEntry> {
        let status = match self.evaluator.resolve_threshold(&receipt.item_id).await {
            Ok(threshold) => {
                let status = AlertStatus::classify(receipt.balance, threshold);
                if status.is_low() {
                    metrics::counter!("alerts_low_status_total").increment(1);
                    tracing::warn!(
                        item_id = %receipt.item_id,
                        balance = %receipt.balance,
                        %threshold,
                        "item below low-stock threshold"
                    );
                }
                Some(status)
            }
            Err(LedgerError::NoThresholdConfigured(_)) => None,
            Err(e) => return Err(e),
        };

        Ok(RecordedEntry { receipt, status })
    }
}
