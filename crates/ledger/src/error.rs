//! Ledger error types.

use common::{ItemId, Quantity, Timestamp};
use stock_store::StoreError;
use thiserror::Error;

/// Errors that can occur during ledger and alert operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The item is not registered and cannot be auto-registered.
    #[error("Unknown item: {0}")]
    UnknownItem(ItemId),

    /// The entry's timestamp is older than the item's last recorded one.
    #[error("Out of order timestamp for item {item_id}: last {last}, attempted {attempted}")]
    OutOfOrderTimestamp {
        item_id: ItemId,
        last: Timestamp,
        attempted: Timestamp,
    },

    /// Applying the delta would take the balance below zero.
    #[error("Insufficient stock for item {item_id}: balance {balance}, delta {delta}")]
    InsufficientStock {
        item_id: ItemId,
        balance: Quantity,
        delta: Quantity,
    },

    /// Neither the item nor the configuration provides a threshold.
    #[error("No low-stock threshold configured for item {0}")]
    NoThresholdConfigured(ItemId),

    /// A quantity was rejected before touching the ledger.
    #[error("Invalid quantity {quantity} for item {item_id}: {reason}")]
    InvalidQuantity {
        item_id: ItemId,
        quantity: Quantity,
        reason: &'static str,
    },

    /// The cached balance disagrees with a replay of the item's history.
    #[error("Integrity violation for item {item_id}: cached {cached}, replayed {replayed}")]
    IntegrityViolation {
        item_id: ItemId,
        cached: Quantity,
        replayed: Quantity,
    },

    /// An error occurred in the stock store.
    #[error("Stock store error: {0}")]
    Store(#[from] StoreError),
}

impl LedgerError {
    /// Short machine-readable name of the error, used for metric labels and
    /// API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerError::UnknownItem(_) => "unknown_item",
            LedgerError::OutOfOrderTimestamp { .. } => "out_of_order_timestamp",
            LedgerError::InsufficientStock { .. } => "insufficient_stock",
            LedgerError::NoThresholdConfigured(_) => "no_threshold_configured",
            LedgerError::InvalidQuantity { .. } => "invalid_quantity",
            LedgerError::IntegrityViolation { .. } => "integrity_violation",
            LedgerError::Store(_) => "storage",
        }
    }
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
