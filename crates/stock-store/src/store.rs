use std::collections::HashMap;
use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;
use thiserror::Error;

use crate::{EntryQuery, ItemId, ItemRecord, Result, SequenceNumber, StockEntry};

/// A stream of stored entries.
pub type EntryStream = Pin<Box<dyn Stream<Item = Result<StockEntry>> + Send>>;

/// Storage backend for the stock ledger.
///
/// A store is a durable, append-only log of entries plus the item registry.
/// It does not validate balances; that is the ledger's job. What it does
/// guarantee is that appends are atomic and that every item's sequence
/// numbers stay contiguous. All implementations must be thread-safe.
#[async_trait]
pub trait StockStore: Send + Sync {
    /// Appends entries atomically: either all are stored or none are.
    ///
    /// Entries may span several items. For each item, the batch's first
    /// sequence must directly follow the last stored one, otherwise the call
    /// fails with `SequenceConflict`.
    async fn append(&self, entries: Vec<StockEntry>) -> Result<()>;

    /// Retrieves all entries for an item in sequence order.
    async fn get_entries_for_item(&self, item_id: &ItemId) -> Result<Vec<StockEntry>>;

    /// Streams an item's entries in sequence order, stopping after `up_to`.
    ///
    /// Calling it again restarts from the first entry.
    async fn stream_item_entries(
        &self,
        item_id: &ItemId,
        up_to: SequenceNumber,
    ) -> Result<EntryStream>;

    /// Retrieves entries matching a query.
    async fn query_entries(&self, query: EntryQuery) -> Result<Vec<StockEntry>>;

    /// Streams every stored entry in insertion order.
    ///
    /// Per item, insertion order equals sequence order.
    async fn stream_all_entries(&self) -> Result<EntryStream>;

    /// Gets the last stored sequence number of an item.
    ///
    /// Returns None if the item has no entries.
    async fn get_last_sequence(&self, item_id: &ItemId) -> Result<Option<SequenceNumber>>;

    /// Inserts or replaces an item record.
    async fn save_item(&self, item: ItemRecord) -> Result<()>;

    /// Retrieves an item record.
    async fn get_item(&self, item_id: &ItemId) -> Result<Option<ItemRecord>>;

    /// Lists all item records ordered by item id.
    async fn list_items(&self) -> Result<Vec<ItemRecord>>;
}

/// Extension trait providing convenience methods for stock stores.
#[async_trait]
pub trait StockStoreExt: StockStore {
    /// Appends a single entry.
    async fn append_entry(&self, entry: StockEntry) -> Result<()> {
        self.append(vec![entry]).await
    }

    /// Checks whether an item has any stored entries.
    async fn has_entries(&self, item_id: &ItemId) -> Result<bool> {
        Ok(self.get_last_sequence(item_id).await?.is_some())
    }
}

// Blanket implementation for all StockStore implementations
impl<T: StockStore + ?Sized> StockStoreExt for T {}

/// Error returned when a batch handed to `append` is malformed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Append validation error: {message}")]
pub struct AppendValidationError {
    pub message: String,
}

/// Validates a batch before appending.
///
/// Returns, per item, the first sequence number in the batch so the caller
/// can check it against what is already stored.
pub fn validate_entries_for_append(
    entries: &[StockEntry],
) -> std::result::Result<HashMap<ItemId, SequenceNumber>, AppendValidationError> {
    if entries.is_empty() {
        return Err(AppendValidationError {
            message: "Cannot append empty entry list".to_string(),
        });
    }

    let mut firsts: HashMap<ItemId, SequenceNumber> = HashMap::new();
    let mut lasts: HashMap<&ItemId, SequenceNumber> = HashMap::new();

    for entry in entries {
        if entry.sequence < SequenceNumber::first() {
            return Err(AppendValidationError {
                message: format!(
                    "Entry for item {} has invalid sequence {}",
                    entry.item_id, entry.sequence
                ),
            });
        }
        if entry.delta.is_zero() {
            return Err(AppendValidationError {
                message: format!("Entry for item {} has a zero delta", entry.item_id),
            });
        }

        match lasts.get(&entry.item_id) {
            Some(last) if entry.sequence != last.next() => {
                return Err(AppendValidationError {
                    message: format!(
                        "Sequences for item {} must be contiguous. Expected {}, got {}",
                        entry.item_id,
                        last.next(),
                        entry.sequence
                    ),
                });
            }
            Some(_) => {}
            None => {
                firsts.insert(entry.item_id.clone(), entry.sequence);
            }
        }
        lasts.insert(&entry.item_id, entry.sequence);
    }

    Ok(firsts)
}
