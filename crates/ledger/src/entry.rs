//! Inputs and outputs of ledger appends.

use common::{ItemId, Quantity, Timestamp};
use serde::{Deserialize, Serialize};
use stock_store::{ReasonCode, SequenceNumber};

/// A stock entry submitted to the ledger.
///
/// The ledger assigns the sequence number; everything else comes from the
/// caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStockEntry {
    pub item_id: ItemId,
    pub delta: Quantity,
    pub timestamp: Timestamp,
    #[serde(default)]
    pub reason: Option<ReasonCode>,
    #[serde(default)]
    pub reference: Option<String>,
}

impl NewStockEntry {
    pub fn new(item_id: impl Into<ItemId>, delta: i64, timestamp: Timestamp) -> Self {
        Self {
            item_id: item_id.into(),
            delta: Quantity::new(delta),
            timestamp,
            reason: None,
            reference: None,
        }
    }

    /// Stock coming in.
    pub fn receipt(item_id: impl Into<ItemId>, quantity: i64, timestamp: Timestamp) -> Self {
        Self::new(item_id, quantity, timestamp).with_reason(ReasonCode::Receipt)
    }

    /// Stock going out; `quantity` is the positive amount consumed.
    pub fn consumption(item_id: impl Into<ItemId>, quantity: i64, timestamp: Timestamp) -> Self {
        Self::new(item_id, quantity.saturating_neg(), timestamp)
            .with_reason(ReasonCode::Consumption)
    }

    pub fn with_reason(mut self, reason: ReasonCode) -> Self {
        self.reason = Some(reason);
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}

/// Result of a successful append.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppendReceipt {
    pub item_id: ItemId,
    pub sequence: SequenceNumber,
    pub balance: Quantity,
}
