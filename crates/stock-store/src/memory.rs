use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    EntryQuery, ItemId, ItemRecord, Result, SequenceNumber, StockEntry, StoreError,
    store::{EntryStream, StockStore, validate_entries_for_append},
};

#[derive(Default)]
struct InMemoryState {
    /// Every entry in insertion order.
    entries: Vec<StockEntry>,
    last_sequences: HashMap<ItemId, SequenceNumber>,
    items: BTreeMap<ItemId, ItemRecord>,
}

impl InMemoryState {
    fn item_entries<'a>(&'a self, item_id: &'a ItemId) -> impl Iterator<Item = &'a StockEntry> {
        self.entries.iter().filter(move |e| &e.item_id == item_id)
    }
}

/// In-memory stock store.
///
/// Provides the same interface and guarantees as the PostgreSQL store;
/// entries live for the lifetime of the process.
#[derive(Clone, Default)]
pub struct InMemoryStockStore {
    state: Arc<RwLock<InMemoryState>>,
}

impl InMemoryStockStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of entries stored.
    pub async fn entry_count(&self) -> usize {
        self.state.read().await.entries.len()
    }

    /// Clears all entries and items.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.entries.clear();
        state.last_sequences.clear();
        state.items.clear();
    }
}

#[async_trait]
impl StockStore for InMemoryStockStore {
    async fn append(&self, entries: Vec<StockEntry>) -> Result<()> {
        let firsts = validate_entries_for_append(&entries)?;

        let mut state = self.state.write().await;

        // Check every item before touching anything so the append stays atomic
        for (item_id, first) in &firsts {
            let last = state
                .last_sequences
                .get(item_id)
                .copied()
                .unwrap_or(SequenceNumber::initial());
            if *first != last.next() {
                return Err(StoreError::SequenceConflict {
                    item_id: item_id.clone(),
                    expected: last.next(),
                    actual: *first,
                });
            }
        }

        for entry in &entries {
            state
                .last_sequences
                .insert(entry.item_id.clone(), entry.sequence);
        }
        state.entries.extend(entries);

        Ok(())
    }

    async fn get_entries_for_item(&self, item_id: &ItemId) -> Result<Vec<StockEntry>> {
        let state = self.state.read().await;
        Ok(state.item_entries(item_id).cloned().collect())
    }

    async fn stream_item_entries(
        &self,
        item_id: &ItemId,
        up_to: SequenceNumber,
    ) -> Result<EntryStream> {
        use futures_util::stream;

        let state = self.state.read().await;
        let entries: Vec<_> = state
            .item_entries(item_id)
            .filter(|e| e.sequence <= up_to)
            .cloned()
            .collect();

        Ok(Box::pin(stream::iter(entries.into_iter().map(Ok))))
    }

    async fn query_entries(&self, query: EntryQuery) -> Result<Vec<StockEntry>> {
        let state = self.state.read().await;
        let mut entries: Vec<_> = state
            .entries
            .iter()
            .filter(|e| query.matches(e))
            .cloned()
            .collect();

        entries.sort_by(|a, b| {
            a.item_id
                .cmp(&b.item_id)
                .then(a.sequence.cmp(&b.sequence))
        });

        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(entries.into_iter().skip(offset).take(limit).collect())
    }

    async fn stream_all_entries(&self) -> Result<EntryStream> {
        use futures_util::stream;

        let entries = self.state.read().await.entries.clone();
        Ok(Box::pin(stream::iter(entries.into_iter().map(Ok))))
    }

    async fn get_last_sequence(&self, item_id: &ItemId) -> Result<Option<SequenceNumber>> {
        let state = self.state.read().await;
        Ok(state.last_sequences.get(item_id).copied())
    }

    async fn save_item(&self, item: ItemRecord) -> Result<()> {
        let mut state = self.state.write().await;
        state.items.insert(item.item_id.clone(), item);
        Ok(())
    }

    async fn get_item(&self, item_id: &ItemId) -> Result<Option<ItemRecord>> {
        let state = self.state.read().await;
        Ok(state.items.get(item_id).cloned())
    }

    async fn list_items(&self) -> Result<Vec<ItemRecord>> {
        let state = self.state.read().await;
        Ok(state.items.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Quantity, ReasonCode, StockStoreExt, Timestamp};

    fn create_test_entry(item: &str, sequence: i64, delta: i64) -> StockEntry {
        StockEntry::new(
            ItemId::new(item),
            SequenceNumber::new(sequence),
            Quantity::new(delta),
            Timestamp::logical(sequence),
        )
    }

    #[tokio::test]
    async fn append_single_entry() {
        let store = InMemoryStockStore::new();
        let entry = create_test_entry("bolt-1", 1, 100);

        store.append_entry(entry).await.unwrap();

        let entries = store
            .get_entries_for_item(&ItemId::new("bolt-1"))
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(store.entry_count().await, 1);
    }

    #[tokio::test]
    async fn append_batch_across_items() {
        let store = InMemoryStockStore::new();

        store
            .append(vec![
                create_test_entry("bolt-1", 1, 100),
                create_test_entry("nut-2", 1, 40),
                create_test_entry("bolt-1", 2, -30),
            ])
            .await
            .unwrap();

        assert_eq!(
            store.get_last_sequence(&ItemId::new("bolt-1")).await.unwrap(),
            Some(SequenceNumber::new(2))
        );
        assert_eq!(
            store.get_last_sequence(&ItemId::new("nut-2")).await.unwrap(),
            Some(SequenceNumber::first())
        );
    }

    #[tokio::test]
    async fn sequence_conflict_on_gap() {
        let store = InMemoryStockStore::new();
        store
            .append_entry(create_test_entry("bolt-1", 1, 100))
            .await
            .unwrap();

        let result = store.append_entry(create_test_entry("bolt-1", 3, 5)).await;

        assert!(matches!(
            result,
            Err(StoreError::SequenceConflict { expected, actual, .. })
                if expected == SequenceNumber::new(2) && actual == SequenceNumber::new(3)
        ));
    }

    #[tokio::test]
    async fn sequence_conflict_on_replayed_sequence() {
        let store = InMemoryStockStore::new();
        store
            .append_entry(create_test_entry("bolt-1", 1, 100))
            .await
            .unwrap();

        let result = store.append_entry(create_test_entry("bolt-1", 1, 100)).await;
        assert!(matches!(result, Err(StoreError::SequenceConflict { .. })));
    }

    #[tokio::test]
    async fn failed_batch_stores_nothing() {
        let store = InMemoryStockStore::new();
        store
            .append_entry(create_test_entry("bolt-1", 1, 100))
            .await
            .unwrap();

        // nut-2 is fine, bolt-1 conflicts
        let result = store
            .append(vec![
                create_test_entry("nut-2", 1, 10),
                create_test_entry("bolt-1", 1, 10),
            ])
            .await;

        assert!(result.is_err());
        assert_eq!(store.entry_count().await, 1);
        assert!(!store.has_entries(&ItemId::new("nut-2")).await.unwrap());
    }

    #[tokio::test]
    async fn stream_item_entries_stops_at_bound() {
        use futures_util::StreamExt;

        let store = InMemoryStockStore::new();
        store
            .append(vec![
                create_test_entry("bolt-1", 1, 100),
                create_test_entry("bolt-1", 2, -30),
                create_test_entry("bolt-1", 3, 5),
            ])
            .await
            .unwrap();

        let stream = store
            .stream_item_entries(&ItemId::new("bolt-1"), SequenceNumber::new(2))
            .await
            .unwrap();
        let entries: Vec<_> = stream.collect().await;

        assert_eq!(entries.len(), 2);
        assert_eq!(
            entries[1].as_ref().unwrap().sequence,
            SequenceNumber::new(2)
        );
    }

    #[tokio::test]
    async fn query_entries_with_filters() {
        let store = InMemoryStockStore::new();
        store
            .append(vec![
                create_test_entry("bolt-1", 1, 100).with_reason(Some(ReasonCode::Receipt)),
                create_test_entry("bolt-1", 2, -30).with_reason(Some(ReasonCode::Consumption)),
                create_test_entry("bolt-1", 3, 50).with_reason(Some(ReasonCode::Receipt)),
            ])
            .await
            .unwrap();

        let receipts = store
            .query_entries(EntryQuery::for_item(ItemId::new("bolt-1")).reason(ReasonCode::Receipt))
            .await
            .unwrap();
        assert_eq!(receipts.len(), 2);

        let page = store
            .query_entries(EntryQuery::new().offset(1).limit(1))
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].sequence, SequenceNumber::new(2));
    }

    #[tokio::test]
    async fn stream_all_entries_in_insertion_order() {
        use futures_util::StreamExt;

        let store = InMemoryStockStore::new();
        store
            .append_entry(create_test_entry("nut-2", 1, 10))
            .await
            .unwrap();
        store
            .append_entry(create_test_entry("bolt-1", 1, 20))
            .await
            .unwrap();

        let entries: Vec<_> = store.stream_all_entries().await.unwrap().collect().await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].as_ref().unwrap().item_id, ItemId::new("nut-2"));
    }

    #[tokio::test]
    async fn item_records_upsert_and_list_sorted() {
        let store = InMemoryStockStore::new();

        store
            .save_item(ItemRecord::registered(ItemId::new("washer")))
            .await
            .unwrap();
        store
            .save_item(ItemRecord::registered(ItemId::new("bolt-1")))
            .await
            .unwrap();
        store
            .save_item(
                ItemRecord::registered(ItemId::new("bolt-1")).with_threshold(Some(Quantity::new(50))),
            )
            .await
            .unwrap();

        let items = store.list_items().await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].item_id, ItemId::new("bolt-1"));
        assert_eq!(items[0].threshold, Some(Quantity::new(50)));

        assert!(
            store
                .get_item(&ItemId::new("missing"))
                .await
                .unwrap()
                .is_none()
        );
    }
}
