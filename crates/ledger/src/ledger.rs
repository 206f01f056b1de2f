//! The stock ledger: validated appends and derived balances.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use common::{ItemId, Quantity};
use futures_util::{StreamExt, TryStreamExt, stream};
use serde::Serialize;
use stock_store::{
    EntryQuery, EntryStream, ItemOrigin, ItemRecord, StockEntry, StockStore, StoreError,
};
use tokio::sync::RwLock;

use crate::config::LedgerConfig;
use crate::entry::{AppendReceipt, NewStockEntry};
use crate::error::{LedgerError, Result};
use crate::state::{ItemLedger, ItemSnapshot, fold_balance};

type ItemHandle = Arc<RwLock<ItemLedger>>;

/// Outcome of a successful integrity check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    pub items_checked: usize,
    pub entries_replayed: usize,
}

/// Append-only stock ledger.
///
/// Every item has its own lock guarding its cached state. Appends hold the
/// item's write lock from validation until the cache is updated, so appends
/// to one item are applied one at a time while different items proceed in
/// parallel. The item map has a separate lock that is only write-locked when
/// an item is created.
pub struct Ledger<S: StockStore> {
    store: S,
    config: LedgerConfig,
    items: RwLock<HashMap<ItemId, ItemHandle>>,
}

impl<S: StockStore> Ledger<S> {
    /// Creates a ledger with empty caches.
    ///
    /// Only correct for a store that holds no entries; use [`Ledger::open`]
    /// for an existing store.
    pub fn new(store: S, config: LedgerConfig) -> Self {
        Self {
            store,
            config,
            items: RwLock::new(HashMap::new()),
        }
    }

    /// Opens a ledger over an existing store, rebuilding every item's
    /// cached state by replaying the stored entries.
    #[tracing::instrument(skip(store))]
    pub async fn open(store: S, config: LedgerConfig) -> Result<Self> {
        let mut states: BTreeMap<ItemId, ItemLedger> = store
            .list_items()
            .await?
            .into_iter()
            .map(|record| (record.item_id.clone(), ItemLedger::new(record)))
            .collect();

        let mut orphans = Vec::new();
        let mut replayed = 0usize;
        let mut entries = store.stream_all_entries().await?;

        while let Some(entry) = entries.next().await {
            let entry = entry?;
            let state = states.entry(entry.item_id.clone()).or_insert_with(|| {
                orphans.push(entry.item_id.clone());
                ItemLedger::new(ItemRecord::auto_created(
                    entry.item_id.clone(),
                    entry.timestamp,
                ))
            });
            state.replay(&entry)?;
            replayed += 1;
        }

        // Entries were persisted but the record write after them failed
        for item_id in &orphans {
            if let Some(state) = states.get(item_id) {
                tracing::warn!(%item_id, "restoring missing item record");
                store.save_item(state.record().clone()).await?;
            }
        }

        tracing::info!(items = states.len(), entries = replayed, "ledger opened");

        let items = states
            .into_iter()
            .map(|(item_id, state)| (item_id, Arc::new(RwLock::new(state))))
            .collect();

        Ok(Self {
            store,
            config,
            items: RwLock::new(items),
        })
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    async fn handle(&self, item_id: &ItemId) -> Option<ItemHandle> {
        self.items.read().await.get(item_id).cloned()
    }

    /// Handles for every known item, ordered by id.
    async fn handles(&self) -> Vec<(ItemId, ItemHandle)> {
        let items = self.items.read().await;
        let mut handles: Vec<_> = items
            .iter()
            .map(|(id, handle)| (id.clone(), handle.clone()))
            .collect();
        handles.sort_by(|a, b| a.0.cmp(&b.0));
        handles
    }

    /// What a read of an unknown item does: nothing in lenient mode, an
    /// error in strict mode.
    fn on_unknown(&self, item_id: &ItemId) -> Result<()> {
        if self.config.strict_items {
            Err(LedgerError::UnknownItem(item_id.clone()))
        } else {
            Ok(())
        }
    }

    // Writes

    /// Appends a single entry.
    #[tracing::instrument(skip(self, entry), fields(item_id = %entry.item_id, delta = %entry.delta))]
    pub async fn append(&self, entry: NewStockEntry) -> Result<AppendReceipt> {
        let mut receipts = self.append_batch(vec![entry]).await?;
        receipts
            .pop()
            .ok_or_else(|| StoreError::Corrupt("append produced no receipt".to_string()).into())
    }

    /// Appends several entries, possibly for several items, all-or-nothing.
    ///
    /// Receipts are returned in input order. An empty batch is a no-op.
    #[tracing::instrument(skip(self, entries), fields(entries = entries.len()))]
    pub async fn append_batch(&self, entries: Vec<NewStockEntry>) -> Result<Vec<AppendReceipt>> {
        if entries.is_empty() {
            return Ok(Vec::new());
        }

        let count = entries.len() as u64;
        match self.apply(entries).await {
            Ok(receipts) => {
                metrics::counter!("ledger_entries_appended_total").increment(count);
                for receipt in &receipts {
                    tracing::info!(
                        item_id = %receipt.item_id,
                        sequence = %receipt.sequence,
                        balance = %receipt.balance,
                        "stock entry appended"
                    );
                }
                Ok(receipts)
            }
            Err(e) => {
                metrics::counter!("ledger_appends_rejected_total", "reason" => e.kind())
                    .increment(1);
                tracing::warn!(error = %e, "append rejected");
                Err(e)
            }
        }
    }

    async fn apply(&self, entries: Vec<NewStockEntry>) -> Result<Vec<AppendReceipt>> {
        // Stateless checks first so a malformed line never creates an item
        for entry in &entries {
            if entry.item_id.is_empty() {
                return Err(LedgerError::UnknownItem(entry.item_id.clone()));
            }
            if entry.delta.is_zero() {
                return Err(LedgerError::InvalidQuantity {
                    item_id: entry.item_id.clone(),
                    quantity: entry.delta,
                    reason: "delta must be non-zero",
                });
            }
        }

        let ids: BTreeSet<ItemId> = entries.iter().map(|e| e.item_id.clone()).collect();

        let known: Option<Vec<ItemHandle>> = {
            let items = self.items.read().await;
            ids.iter().map(|id| items.get(id).cloned()).collect()
        };
        if let Some(handles) = known {
            let (receipts, _) = self.commit(&entries, handles, Vec::new()).await?;
            return Ok(receipts);
        }

        // At least one item is new. The map stays write-locked until the new
        // items are installed so a concurrent first append cannot create
        // them twice.
        let mut items = self.items.write().await;
        let mut handles = Vec::with_capacity(ids.len());
        let mut fresh = Vec::new();

        for id in &ids {
            if let Some(handle) = items.get(id) {
                handles.push(handle.clone());
                continue;
            }
            if !self.config.auto_register {
                return Err(LedgerError::UnknownItem(id.clone()));
            }
            let first_seen = entries
                .iter()
                .find(|e| &e.item_id == id)
                .map(|e| e.timestamp)
                .unwrap_or_default();
            fresh.push(ItemLedger::new(ItemRecord::auto_created(
                id.clone(),
                first_seen,
            )));
        }

        let (receipts, created) = self.commit(&entries, handles, fresh).await?;

        let records: Vec<ItemRecord> = created.iter().map(|s| s.record().clone()).collect();
        for state in created {
            items.insert(state.item_id().clone(), Arc::new(RwLock::new(state)));
        }

        // The entries are durable at this point, so the append has succeeded
        // whatever happens to the records. Saving them under the map lock
        // keeps `register_item` from writing a newer record first.
        for record in records {
            metrics::counter!("ledger_items_registered_total", "origin" => record.origin.as_str())
                .increment(1);
            tracing::info!(item_id = %record.item_id, "item auto-registered");

            let item_id = record.item_id.clone();
            if let Err(e) = self.store.save_item(record).await {
                tracing::error!(
                    %item_id,
                    error = %e,
                    "failed to save auto-created item record; it is restored from its entries on open"
                );
            }
        }
        drop(items);

        Ok(receipts)
    }

    /// Validates every entry against staged copies of the item states,
    /// persists them in one store append, then publishes the staged states.
    ///
    /// `handles` must be in ascending item id order. Returns the receipts
    /// and the staged states of `fresh` items.
    async fn commit(
        &self,
        entries: &[NewStockEntry],
        handles: Vec<ItemHandle>,
        fresh: Vec<ItemLedger>,
    ) -> Result<(Vec<AppendReceipt>, Vec<ItemLedger>)> {
        let mut guards = Vec::with_capacity(handles.len());
        for handle in handles {
            guards.push(handle.write_owned().await);
        }

        let mut staged: HashMap<ItemId, ItemLedger> = guards
            .iter()
            .map(|guard| (guard.item_id().clone(), (**guard).clone()))
            .chain(fresh.into_iter().map(|s| (s.item_id().clone(), s)))
            .collect();

        let policy = self.config.correction_policy;
        let mut stored = Vec::with_capacity(entries.len());
        let mut receipts = Vec::with_capacity(entries.len());

        for entry in entries {
            let state = staged
                .get_mut(&entry.item_id)
                .ok_or_else(|| LedgerError::UnknownItem(entry.item_id.clone()))?;
            let record = state.stage(entry, policy)?;
            receipts.push(AppendReceipt {
                item_id: entry.item_id.clone(),
                sequence: record.sequence,
                balance: state.balance(),
            });
            stored.push(record);
        }

        self.store.append(stored).await?;

        for guard in &mut guards {
            if let Some(state) = staged.remove(guard.item_id()) {
                **guard = state;
            }
        }

        Ok((receipts, staged.into_values().collect()))
    }

    /// Registers an item, or updates the name and threshold of an existing
    /// one. Fields passed as `None` are left as they are.
    #[tracing::instrument(skip(self))]
    pub async fn register_item(
        &self,
        item_id: ItemId,
        name: Option<String>,
        threshold: Option<Quantity>,
    ) -> Result<ItemRecord> {
        if item_id.is_empty() {
            return Err(LedgerError::UnknownItem(item_id));
        }
        check_threshold(&item_id, threshold)?;

        let mut items = self.items.write().await;

        if let Some(handle) = items.get(&item_id).cloned() {
            drop(items);
            let mut state = handle.write().await;
            let mut record = state.record().clone();
            record.origin = ItemOrigin::Registered;
            if name.is_some() {
                record.name = name;
            }
            if threshold.is_some() {
                record.threshold = threshold;
            }
            self.store.save_item(record.clone()).await?;
            state.set_record(record.clone());
            return Ok(record);
        }

        let record = ItemRecord::registered(item_id.clone())
            .with_name(name)
            .with_threshold(threshold);
        self.store.save_item(record.clone()).await?;
        items.insert(item_id, Arc::new(RwLock::new(ItemLedger::new(record.clone()))));

        metrics::counter!("ledger_items_registered_total", "origin" => record.origin.as_str())
            .increment(1);
        tracing::info!(item_id = %record.item_id, "item registered");

        Ok(record)
    }

    /// Sets or clears an item's own threshold.
    #[tracing::instrument(skip(self))]
    pub async fn set_threshold(
        &self,
        item_id: &ItemId,
        threshold: Option<Quantity>,
    ) -> Result<ItemRecord> {
        check_threshold(item_id, threshold)?;

        let handle = self
            .handle(item_id)
            .await
            .ok_or_else(|| LedgerError::UnknownItem(item_id.clone()))?;
        let mut state = handle.write().await;

        let record = state.record().clone().with_threshold(threshold);
        self.store.save_item(record.clone()).await?;
        state.set_record(record.clone());

        Ok(record)
    }

    // Reads

    pub async fn item(&self, item_id: &ItemId) -> Option<ItemRecord> {
        let handle = self.handle(item_id).await?;
        let state = handle.read().await;
        Some(state.record().clone())
    }

    /// All item records, ordered by id.
    pub async fn items(&self) -> Vec<ItemRecord> {
        let mut records = Vec::new();
        for (_, handle) in self.handles().await {
            records.push(handle.read().await.record().clone());
        }
        records
    }

    /// All item ids, ordered.
    pub async fn item_ids(&self) -> Vec<ItemId> {
        let mut ids: Vec<_> = self.items.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Point-in-time copy of an item's state, `None` for unknown items.
    pub async fn snapshot(&self, item_id: &ItemId) -> Option<ItemSnapshot> {
        let handle = self.handle(item_id).await?;
        let state = handle.read().await;
        Some(state.snapshot())
    }

    /// Current balance of an item.
    ///
    /// Unknown items have a balance of zero unless strict mode is on.
    pub async fn balance(&self, item_id: &ItemId) -> Result<Quantity> {
        match self.handle(item_id).await {
            Some(handle) => Ok(handle.read().await.balance()),
            None => self.on_unknown(item_id).map(|_| Quantity::zero()),
        }
    }

    /// Streams an item's entries in sequence order.
    ///
    /// The stream ends at the last entry present when it was created, so a
    /// concurrent append is either fully visible or not at all. Call again
    /// to restart.
    pub async fn history(&self, item_id: &ItemId) -> Result<EntryStream> {
        let Some(handle) = self.handle(item_id).await else {
            self.on_unknown(item_id)?;
            return Ok(Box::pin(stream::empty::<stock_store::Result<StockEntry>>()));
        };

        let up_to = handle.read().await.last_sequence();
        Ok(self.store.stream_item_entries(item_id, up_to).await?)
    }

    /// Collects [`Ledger::history`] into a vector.
    pub async fn history_entries(&self, item_id: &ItemId) -> Result<Vec<StockEntry>> {
        let entries: Vec<StockEntry> = self.history(item_id).await?.try_collect().await?;
        Ok(entries)
    }

    /// Runs a filtered audit query over stored entries.
    pub async fn query_history(&self, query: EntryQuery) -> Result<Vec<StockEntry>> {
        if let Some(ref item_id) = query.item_id
            && self.handle(item_id).await.is_none()
        {
            self.on_unknown(item_id)?;
            return Ok(Vec::new());
        }

        Ok(self.store.query_entries(query).await?)
    }

    // Verification

    /// Recomputes every item's balance from its full stored history.
    #[tracing::instrument(skip(self))]
    pub async fn replay_all(&self) -> Result<BTreeMap<ItemId, Quantity>> {
        let mut balances: BTreeMap<ItemId, Quantity> = self
            .item_ids()
            .await
            .into_iter()
            .map(|id| (id, Quantity::zero()))
            .collect();

        let mut entries = self.store.stream_all_entries().await?;
        while let Some(entry) = entries.next().await {
            let entry = entry?;
            let balance = balances.entry(entry.item_id.clone()).or_default();
            *balance = balance
                .checked_add(entry.delta)
                .ok_or_else(|| LedgerError::InvalidQuantity {
                    item_id: entry.item_id.clone(),
                    quantity: entry.delta,
                    reason: "balance would overflow",
                })?;
        }

        Ok(balances)
    }

    /// Compares every cached balance with a replay of the item's history.
    ///
    /// Divergences are logged and reported as `IntegrityViolation` (the
    /// first one by item id). Nothing is corrected.
    #[tracing::instrument(skip(self))]
    pub async fn verify_integrity(&self) -> Result<IntegrityReport> {
        let mut report = IntegrityReport::default();
        let mut violation = None;

        for (item_id, handle) in self.handles().await {
            // Holding the read lock keeps ledger appends to this item out
            let state = handle.read().await;
            let entries = self.store.get_entries_for_item(&item_id).await?;
            let replayed = fold_balance(&entries).ok_or_else(|| LedgerError::InvalidQuantity {
                item_id: item_id.clone(),
                quantity: state.balance(),
                reason: "replayed balance overflows",
            })?;

            report.items_checked += 1;
            report.entries_replayed += entries.len();

            if replayed != state.balance() {
                tracing::error!(
                    %item_id,
                    cached = %state.balance(),
                    %replayed,
                    "cached balance diverges from history"
                );
                violation.get_or_insert(LedgerError::IntegrityViolation {
                    item_id,
                    cached: state.balance(),
                    replayed,
                });
            }
        }

        if let Some(violation) = violation {
            return Err(violation);
        }

        tracing::info!(
            items = report.items_checked,
            entries = report.entries_replayed,
            "ledger integrity verified"
        );
        Ok(report)
    }
}

fn check_threshold(item_id: &ItemId, threshold: Option<Quantity>) -> Result<()> {
    if let Some(threshold) = threshold
        && threshold.is_negative()
    {
        return Err(LedgerError::InvalidQuantity {
            item_id: item_id.clone(),
            quantity: threshold,
            reason: "threshold must be non-negative",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Timestamp;
    use stock_store::{InMemoryStockStore, SequenceNumber};

    fn ledger() -> Ledger<InMemoryStockStore> {
        Ledger::new(InMemoryStockStore::new(), LedgerConfig::default())
    }

    #[tokio::test]
    async fn first_append_auto_registers_item() {
        let ledger = ledger();

        let receipt = ledger
            .append(NewStockEntry::receipt("bolt-1", 100, Timestamp::logical(4)))
            .await
            .unwrap();

        assert_eq!(receipt.sequence, SequenceNumber::first());
        let record = ledger.item(&ItemId::new("bolt-1")).await.unwrap();
        assert_eq!(record.origin, ItemOrigin::AutoCreated);
        assert_eq!(record.first_seen, Some(Timestamp::logical(4)));
        assert!(
            ledger
                .store()
                .get_item(&ItemId::new("bolt-1"))
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn rejected_first_append_leaves_no_item() {
        let ledger = ledger();

        let result = ledger
            .append(NewStockEntry::new("bolt-1", -5, Timestamp::logical(1)))
            .await;

        assert!(matches!(result, Err(LedgerError::InsufficientStock { .. })));
        assert!(ledger.item(&ItemId::new("bolt-1")).await.is_none());
        assert!(ledger.store().list_items().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_item_id_is_unknown() {
        let ledger = ledger();
        let result = ledger
            .append(NewStockEntry::new("", 5, Timestamp::logical(1)))
            .await;
        assert!(matches!(result, Err(LedgerError::UnknownItem(_))));
    }

    #[tokio::test]
    async fn register_item_is_idempotent_and_updates_fields() {
        let ledger = ledger();
        let id = ItemId::new("steel-sheet");

        ledger
            .register_item(id.clone(), Some("Steel sheet".to_string()), None)
            .await
            .unwrap();
        let updated = ledger
            .register_item(id.clone(), None, Some(Quantity::new(10)))
            .await
            .unwrap();

        assert_eq!(updated.name.as_deref(), Some("Steel sheet"));
        assert_eq!(updated.threshold, Some(Quantity::new(10)));
        assert_eq!(ledger.items().await.len(), 1);
    }

    #[tokio::test]
    async fn negative_threshold_is_rejected() {
        let ledger = ledger();
        let result = ledger
            .register_item(ItemId::new("bolt-1"), None, Some(Quantity::new(-1)))
            .await;
        assert!(matches!(result, Err(LedgerError::InvalidQuantity { .. })));
    }

    #[tokio::test]
    async fn set_threshold_requires_known_item() {
        let ledger = ledger();
        let id = ItemId::new("bolt-1");

        assert!(matches!(
            ledger.set_threshold(&id, Some(Quantity::new(5))).await,
            Err(LedgerError::UnknownItem(_))
        ));

        ledger.register_item(id.clone(), None, None).await.unwrap();
        let record = ledger
            .set_threshold(&id, Some(Quantity::new(5)))
            .await
            .unwrap();
        assert_eq!(record.threshold, Some(Quantity::new(5)));

        let cleared = ledger.set_threshold(&id, None).await.unwrap();
        assert!(cleared.threshold.is_none());
    }

    #[tokio::test]
    async fn items_are_listed_in_id_order() {
        let ledger = ledger();
        for id in ["washer", "bolt-1", "nut-2"] {
            ledger
                .append(NewStockEntry::receipt(id, 1, Timestamp::logical(1)))
                .await
                .unwrap();
        }

        let ids: Vec<_> = ledger.items().await.into_iter().map(|r| r.item_id).collect();
        assert_eq!(
            ids,
            vec![
                ItemId::new("bolt-1"),
                ItemId::new("nut-2"),
                ItemId::new("washer")
            ]
        );
        assert_eq!(ledger.item_ids().await, ids);
    }
}
