use criterion::{Criterion, criterion_group, criterion_main};
use stock_store::{
    EntryQuery, InMemoryStockStore, ItemId, Quantity, ReasonCode, SequenceNumber, StockEntry,
    StockStore, StockStoreExt, Timestamp,
};

fn make_entry(item: &str, sequence: i64) -> StockEntry {
    let delta = if sequence % 3 == 0 { -2 } else { 5 };
    StockEntry::new(
        ItemId::new(item),
        SequenceNumber::new(sequence),
        Quantity::new(delta),
        Timestamp::logical(sequence),
    )
    .with_reason(Some(if delta > 0 {
        ReasonCode::Receipt
    } else {
        ReasonCode::Consumption
    }))
}

fn bench_append_single_entry(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("stock_store/append_single_entry", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = InMemoryStockStore::new();
                store.append_entry(make_entry("bolt-1", 1)).await.unwrap();
            });
        });
    });
}

fn bench_append_batch_10(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("stock_store/append_batch_10", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = InMemoryStockStore::new();
                let entries: Vec<_> = (1..=10).map(|s| make_entry("bolt-1", s)).collect();
                store.append(entries).await.unwrap();
            });
        });
    });
}

fn bench_read_item_history(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryStockStore::new();

    rt.block_on(async {
        for item in ["bolt-1", "nut-2", "washer-3"] {
            let entries: Vec<_> = (1..=500).map(|s| make_entry(item, s)).collect();
            store.append(entries).await.unwrap();
        }
    });

    c.bench_function("stock_store/read_item_history_500", |b| {
        b.iter(|| {
            rt.block_on(async {
                store
                    .get_entries_for_item(&ItemId::new("nut-2"))
                    .await
                    .unwrap()
            })
        });
    });

    c.bench_function("stock_store/query_receipts", |b| {
        b.iter(|| {
            rt.block_on(async {
                store
                    .query_entries(
                        EntryQuery::for_item(ItemId::new("bolt-1")).reason(ReasonCode::Receipt),
                    )
                    .await
                    .unwrap()
            })
        });
    });
}

criterion_group!(
    benches,
    bench_append_single_entry,
    bench_append_batch_10,
    bench_read_item_history,
);
criterion_main!(benches);
