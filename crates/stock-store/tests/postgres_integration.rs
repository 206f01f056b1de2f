//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p stock-store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use futures_util::StreamExt;
use sqlx::PgPool;
use stock_store::{
    EntryQuery, ItemId, ItemOrigin, ItemRecord, PostgresStockStore, Quantity, ReasonCode,
    SequenceNumber, StockEntry, StockStore, StockStoreExt, StoreError, Timestamp,
};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_stock_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

async fn get_test_store() -> PostgresStockStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE stock_entries, stock_items")
        .execute(&pool)
        .await
        .unwrap();

    PostgresStockStore::new(pool)
}

fn entry(item: &str, sequence: i64, delta: i64) -> StockEntry {
    StockEntry::new(
        ItemId::new(item),
        SequenceNumber::new(sequence),
        Quantity::new(delta),
        Timestamp::logical(sequence * 10),
    )
}

#[tokio::test]
async fn append_and_read_back() {
    let store = get_test_store().await;

    store
        .append(vec![
            entry("bolt-1", 1, 100)
                .with_reason(Some(ReasonCode::Receipt))
                .with_reference(Some("PO-7".to_string())),
            entry("bolt-1", 2, -30).with_reason(Some(ReasonCode::Consumption)),
        ])
        .await
        .unwrap();

    let entries = store
        .get_entries_for_item(&ItemId::new("bolt-1"))
        .await
        .unwrap();

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].delta, Quantity::new(100));
    assert_eq!(entries[0].reason, Some(ReasonCode::Receipt));
    assert_eq!(entries[0].reference.as_deref(), Some("PO-7"));
    assert_eq!(entries[1].timestamp, Timestamp::logical(20));
    assert_eq!(
        store.get_last_sequence(&ItemId::new("bolt-1")).await.unwrap(),
        Some(SequenceNumber::new(2))
    );
}

#[tokio::test]
async fn conflicting_sequence_is_rejected() {
    let store = get_test_store().await;
    store.append_entry(entry("bolt-1", 1, 100)).await.unwrap();

    let result = store.append_entry(entry("bolt-1", 1, 5)).await;

    assert!(matches!(
        result,
        Err(StoreError::SequenceConflict { expected, .. }) if expected == SequenceNumber::new(2)
    ));
}

#[tokio::test]
async fn multi_item_batch_is_atomic() {
    let store = get_test_store().await;
    store.append_entry(entry("bolt-1", 1, 100)).await.unwrap();

    let result = store
        .append(vec![entry("nut-2", 1, 10), entry("bolt-1", 5, -1)])
        .await;

    assert!(result.is_err());
    assert!(!store.has_entries(&ItemId::new("nut-2")).await.unwrap());
}

#[tokio::test]
async fn concurrent_appends_to_same_item_conflict() {
    let store = get_test_store().await;
    store.append_entry(entry("bolt-1", 1, 100)).await.unwrap();

    let a = store.clone();
    let b = store.clone();
    let (ra, rb) = tokio::join!(
        async move { a.append_entry(entry("bolt-1", 2, -1)).await },
        async move { b.append_entry(entry("bolt-1", 2, -2)).await },
    );

    // Exactly one writer wins sequence 2
    assert!(ra.is_ok() ^ rb.is_ok());
    assert_eq!(
        store.get_last_sequence(&ItemId::new("bolt-1")).await.unwrap(),
        Some(SequenceNumber::new(2))
    );
}

#[tokio::test]
async fn stream_all_entries_in_insertion_order() {
    let store = get_test_store().await;
    store.append_entry(entry("nut-2", 1, 10)).await.unwrap();
    store.append_entry(entry("bolt-1", 1, 20)).await.unwrap();
    store.append_entry(entry("nut-2", 2, 5)).await.unwrap();

    let entries: Vec<_> = store.stream_all_entries().await.unwrap().collect().await;
    let items: Vec<_> = entries
        .into_iter()
        .map(|e| e.unwrap().item_id.as_str().to_string())
        .collect();

    assert_eq!(items, vec!["nut-2", "bolt-1", "nut-2"]);
}

#[tokio::test]
async fn stream_item_entries_is_bounded() {
    let store = get_test_store().await;
    store
        .append(vec![
            entry("bolt-1", 1, 10),
            entry("bolt-1", 2, 10),
            entry("bolt-1", 3, 10),
        ])
        .await
        .unwrap();

    let entries: Vec<_> = store
        .stream_item_entries(&ItemId::new("bolt-1"), SequenceNumber::new(2))
        .await
        .unwrap()
        .collect()
        .await;

    assert_eq!(entries.len(), 2);
}

#[tokio::test]
async fn query_entries_filters_and_pages() {
    let store = get_test_store().await;
    store
        .append(vec![
            entry("bolt-1", 1, 100).with_reason(Some(ReasonCode::Receipt)),
            entry("bolt-1", 2, -30).with_reason(Some(ReasonCode::Consumption)),
            entry("bolt-1", 3, 40).with_reason(Some(ReasonCode::Receipt)),
            entry("nut-2", 1, 9).with_reason(Some(ReasonCode::Receipt)),
        ])
        .await
        .unwrap();

    let receipts = store
        .query_entries(EntryQuery::for_item(ItemId::new("bolt-1")).reason(ReasonCode::Receipt))
        .await
        .unwrap();
    assert_eq!(receipts.len(), 2);

    let page = store
        .query_entries(EntryQuery::new().offset(2).limit(2))
        .await
        .unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].sequence, SequenceNumber::new(3));
    assert_eq!(page[1].item_id, ItemId::new("nut-2"));

    let window = store
        .query_entries(
            EntryQuery::new()
                .from_timestamp(Timestamp::logical(20))
                .to_timestamp(Timestamp::logical(20)),
        )
        .await
        .unwrap();
    assert_eq!(window.len(), 1);
}

#[tokio::test]
async fn item_records_round_trip_through_upsert() {
    let store = get_test_store().await;

    store
        .save_item(ItemRecord::auto_created(
            ItemId::new("bolt-1"),
            Timestamp::logical(7),
        ))
        .await
        .unwrap();
    store
        .save_item(
            ItemRecord::registered(ItemId::new("bolt-1"))
                .with_name(Some("Bolt M6".to_string()))
                .with_threshold(Some(Quantity::new(25))),
        )
        .await
        .unwrap();
    store
        .save_item(ItemRecord::registered(ItemId::new("anchor")))
        .await
        .unwrap();

    let bolt = store
        .get_item(&ItemId::new("bolt-1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(bolt.origin, ItemOrigin::Registered);
    assert_eq!(bolt.name.as_deref(), Some("Bolt M6"));
    assert_eq!(bolt.threshold, Some(Quantity::new(25)));

    let ids: Vec<_> = store
        .list_items()
        .await
        .unwrap()
        .into_iter()
        .map(|i| i.item_id)
        .collect();
    assert_eq!(ids, vec![ItemId::new("anchor"), ItemId::new("bolt-1")]);
}
