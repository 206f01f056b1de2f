//! Per-item derived state.

use common::{ItemId, Quantity, Timestamp};
use stock_store::{ItemRecord, ReasonCode, SequenceNumber, StockEntry, StoreError};

use crate::config::CorrectionPolicy;
use crate::entry::NewStockEntry;
use crate::error::{LedgerError, Result};

/// Folds entries into a balance.
///
/// Returns `None` if the sum overflows.
pub fn fold_balance<'a>(entries: impl IntoIterator<Item = &'a StockEntry>) -> Option<Quantity> {
    entries
        .into_iter()
        .try_fold(Quantity::zero(), |balance, entry| {
            balance.checked_add(entry.delta)
        })
}

/// The ledger's cached view of one item.
///
/// `balance` always equals the fold of the item's stored entries. It is
/// changed only through [`ItemLedger::stage`] (new entries) and
/// [`ItemLedger::replay`] (entries read back from the store).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemLedger {
    record: ItemRecord,
    balance: Quantity,
    last_sequence: SequenceNumber,
    last_timestamp: Option<Timestamp>,
}

impl ItemLedger {
    /// Creates state for an item with no entries.
    pub fn new(record: ItemRecord) -> Self {
        Self {
            record,
            balance: Quantity::zero(),
            last_sequence: SequenceNumber::initial(),
            last_timestamp: None,
        }
    }

    pub fn item_id(&self) -> &ItemId {
        &self.record.item_id
    }

    pub fn record(&self) -> &ItemRecord {
        &self.record
    }

    pub fn balance(&self) -> Quantity {
        self.balance
    }

    pub fn last_sequence(&self) -> SequenceNumber {
        self.last_sequence
    }

    pub fn last_timestamp(&self) -> Option<Timestamp> {
        self.last_timestamp
    }

    pub(crate) fn set_record(&mut self, record: ItemRecord) {
        self.record = record;
    }

    /// Validates a new entry against the current state and applies it.
    ///
    /// On success the state reflects the entry and the stored form of the
    /// entry (with its assigned sequence number) is returned. On failure the
    /// state is left untouched.
    pub fn stage(&mut self, entry: &NewStockEntry, policy: CorrectionPolicy) -> Result<StockEntry> {
        let item_id = self.item_id();

        if entry.delta.is_zero() {
            return Err(LedgerError::InvalidQuantity {
                item_id: item_id.clone(),
                quantity: entry.delta,
                reason: "delta must be non-zero",
            });
        }

        if let Some(last) = self.last_timestamp
            && entry.timestamp < last
        {
            return Err(LedgerError::OutOfOrderTimestamp {
                item_id: item_id.clone(),
                last,
                attempted: entry.timestamp,
            });
        }

        let candidate =
            self.balance
                .checked_add(entry.delta)
                .ok_or_else(|| LedgerError::InvalidQuantity {
                    item_id: item_id.clone(),
                    quantity: entry.delta,
                    reason: "balance would overflow",
                })?;

        let bypass = policy == CorrectionPolicy::AllowNegative
            && entry.reason == Some(ReasonCode::Correction);
        if entry.delta.is_negative() && candidate.is_negative() && !bypass {
            return Err(LedgerError::InsufficientStock {
                item_id: item_id.clone(),
                balance: self.balance,
                delta: entry.delta,
            });
        }

        let stored = StockEntry::new(
            item_id.clone(),
            self.last_sequence.next(),
            entry.delta,
            entry.timestamp,
        )
        .with_reason(entry.reason)
        .with_reference(entry.reference.clone());

        self.balance = candidate;
        self.last_sequence = stored.sequence;
        self.last_timestamp = Some(stored.timestamp);

        Ok(stored)
    }

    /// Applies an entry read back from the store.
    ///
    /// Checks that the entry belongs to this item, continues its sequence
    /// and does not go back in time. The balance floor is not re-checked:
    /// stored history was validated when it was appended.
    pub fn replay(&mut self, entry: &StockEntry) -> Result<()> {
        if entry.item_id != self.record.item_id || entry.sequence != self.last_sequence.next() {
            return Err(StoreError::Corrupt(format!(
                "entry {} for item {} has sequence {}, expected {} for item {}",
                entry.entry_id,
                entry.item_id,
                entry.sequence,
                self.last_sequence.next(),
                self.record.item_id
            ))
            .into());
        }

        if let Some(last) = self.last_timestamp
            && entry.timestamp < last
        {
            return Err(LedgerError::OutOfOrderTimestamp {
                item_id: entry.item_id.clone(),
                last,
                attempted: entry.timestamp,
            });
        }

        self.balance =
            self.balance
                .checked_add(entry.delta)
                .ok_or_else(|| LedgerError::InvalidQuantity {
                    item_id: entry.item_id.clone(),
                    quantity: entry.delta,
                    reason: "balance would overflow",
                })?;
        self.last_sequence = entry.sequence;
        self.last_timestamp = Some(entry.timestamp);

        Ok(())
    }

    /// Returns a copy of the state suitable for callers outside the lock.
    pub fn snapshot(&self) -> ItemSnapshot {
        ItemSnapshot {
            record: self.record.clone(),
            balance: self.balance,
            last_sequence: self.last_sequence,
            last_timestamp: self.last_timestamp,
        }
    }
}

/// A consistent, point-in-time copy of an item's state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemSnapshot {
    pub record: ItemRecord,
    pub balance: Quantity,
    pub last_sequence: SequenceNumber,
    pub last_timestamp: Option<Timestamp>,
}
