//! Alert classification over ledger balances.

use std::collections::BTreeSet;
use std::sync::Arc;

use common::{ItemId, Quantity};
use ledger::{Ledger, LedgerError, Result};
use serde::{Deserialize, Serialize};
use stock_store::StockStore;

use crate::threshold::ThresholdSource;

/// Alert state of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertStatus {
    Ok,
    Low,
}

impl AlertStatus {
    /// `Low` iff the balance is strictly below the threshold.
    pub fn classify(balance: Quantity, threshold: Quantity) -> Self {
        if balance < threshold {
            AlertStatus::Low
        } else {
            AlertStatus::Ok
        }
    }

    pub fn is_low(&self) -> bool {
        matches!(self, AlertStatus::Low)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Ok => "OK",
            AlertStatus::Low => "LOW",
        }
    }
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Balance, resolved threshold and status of one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemStatus {
    pub item_id: ItemId,
    pub status: AlertStatus,
    pub balance: Quantity,
    pub threshold: Quantity,
}

/// Entry of the low-stock report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LowStockItem {
    pub item_id: ItemId,
    pub balance: Quantity,
    pub threshold: Quantity,
}

/// Classifies items as OK or LOW.
///
/// Holds no state of its own: every answer is derived from the ledger's
/// current snapshot of the item and the resolved threshold.
pub struct AlertEvaluator<S: StockStore, T: ThresholdSource> {
    ledger: Arc<Ledger<S>>,
    thresholds: T,
}

impl<S: StockStore, T: ThresholdSource> AlertEvaluator<S, T> {
    pub fn new(ledger: Arc<Ledger<S>>, thresholds: T) -> Self {
        Self { ledger, thresholds }
    }

    pub fn ledger(&self) -> &Arc<Ledger<S>> {
        &self.ledger
    }

    pub fn thresholds(&self) -> &T {
        &self.thresholds
    }

    /// Resolves an item's threshold: its own, then the configured
    /// per-item value, then the configured default.
    pub async fn resolve_threshold(&self, item_id: &ItemId) -> Result<Quantity> {
        let own = self.ledger.item(item_id).await.and_then(|r| r.threshold);
        self.resolve(item_id, own)
    }

    pub(crate) fn resolve(&self, item_id: &ItemId, own: Option<Quantity>) -> Result<Quantity> {
        own.or_else(|| self.thresholds.threshold(item_id))
            .or_else(|| self.thresholds.default_threshold())
            .ok_or_else(|| LedgerError::NoThresholdConfigured(item_id.clone()))
    }

    /// Balance, threshold and status, all read from one snapshot.
    pub async fn evaluate(&self, item_id: &ItemId) -> Result<ItemStatus> {
        let (balance, own) = match self.ledger.snapshot(item_id).await {
            Some(snapshot) => (snapshot.balance, snapshot.record.threshold),
            None => (self.ledger.balance(item_id).await?, None),
        };
        let threshold = self.resolve(item_id, own)?;

        Ok(ItemStatus {
            item_id: item_id.clone(),
            status: AlertStatus::classify(balance, threshold),
            balance,
            threshold,
        })
    }

    /// Current status of an item.
    pub async fn status(&self, item_id: &ItemId) -> Result<AlertStatus> {
        Ok(self.evaluate(item_id).await?.status)
    }

    /// Returns the given items that are currently LOW.
    ///
    /// Items without any threshold cannot be LOW and are skipped.
    pub async fn low_items<'a>(
        &self,
        item_ids: impl IntoIterator<Item = &'a ItemId>,
    ) -> Result<BTreeSet<ItemId>> {
        Ok(self
            .low_stock_report(item_ids)
            .await?
            .into_iter()
            .map(|item| item.item_id)
            .collect())
    }

    /// Every registered item that is currently LOW.
    pub async fn low_items_all(&self) -> Result<BTreeSet<ItemId>> {
        let ids = self.ledger.item_ids().await;
        self.low_items(&ids).await
    }

    /// LOW items among `item_ids` with their balance and threshold, ordered
    /// by item id.
    pub async fn low_stock_report<'a>(
        &self,
        item_ids: impl IntoIterator<Item = &'a ItemId>,
    ) -> Result<Vec<LowStockItem>> {
        let ids: BTreeSet<&ItemId> = item_ids.into_iter().collect();
        let mut report = Vec::new();

        for item_id in ids {
            match self.evaluate(item_id).await {
                Ok(status) if status.status.is_low() => report.push(LowStockItem {
                    item_id: status.item_id,
                    balance: status.balance,
                    threshold: status.threshold,
                }),
                Ok(_) | Err(LedgerError::NoThresholdConfigured(_)) => {}
                Err(e) => return Err(e),
            }
        }

        Ok(report)
    }

    /// Low-stock report over every registered item.
    pub async fn low_stock_report_all(&self) -> Result<Vec<LowStockItem>> {
        let ids = self.ledger.item_ids().await;
        self.low_stock_report(&ids).await
    }
}
