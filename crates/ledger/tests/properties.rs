//! Property tests for balance derivation.

use std::collections::HashMap;

use common::{ItemId, Quantity, Timestamp};
use ledger::{Ledger, LedgerConfig, LedgerError, NewStockEntry, fold_balance};
use proptest::prelude::*;
use stock_store::InMemoryStockStore;

const ITEMS: [&str; 4] = ["bolt-1", "nut-2", "washer-3", "gear-4"];

/// `(item index, delta, timestamp)`; timestamps are drawn from a narrow
/// range so that ties and out-of-order entries are both common.
fn ops() -> impl Strategy<Value = Vec<(usize, i64, i64)>> {
    prop::collection::vec((0..ITEMS.len(), -500i64..1_000i64, 0i64..40), 1..300)
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        ..ProptestConfig::default()
    })]

    /// Property: whatever appends are accepted or rejected, every balance
    /// equals the fold of the item's history and never drops below zero.
    #[test]
    fn balance_equals_fold_and_stays_non_negative(ops in ops()) {
        runtime().block_on(async {
            let ledger = Ledger::new(InMemoryStockStore::new(), LedgerConfig::default());

            let mut last_seen: HashMap<usize, i64> = HashMap::new();

            for (item, delta, tick) in ops {
                let item_id = ItemId::new(ITEMS[item]);
                let entry = NewStockEntry::new(ITEMS[item], delta, Timestamp::logical(tick));
                let before = ledger.balance(&item_id).await.unwrap();
                let older = last_seen.get(&item).is_some_and(|last| tick < *last);

                match ledger.append(entry).await {
                    Ok(receipt) => {
                        prop_assert!(!older, "older timestamp accepted for {}", item_id);
                        prop_assert_eq!(receipt.balance, Quantity::new(before.as_i64() + delta));
                        last_seen.insert(item, tick);
                    }
                    Err(LedgerError::OutOfOrderTimestamp { .. }) => {
                        prop_assert!(older, "in-order timestamp rejected for {}", item_id);
                        prop_assert_eq!(ledger.balance(&item_id).await.unwrap(), before);
                    }
                    Err(LedgerError::InsufficientStock { .. }) | Err(LedgerError::InvalidQuantity { .. }) => {
                        prop_assert_eq!(ledger.balance(&item_id).await.unwrap(), before);
                    }
                    Err(e) => prop_assert!(false, "unexpected error: {}", e),
                }
            }

            let replayed = ledger.replay_all().await.unwrap();
            for (item_id, balance) in &replayed {
                let history = ledger.history_entries(item_id).await.unwrap();
                prop_assert_eq!(fold_balance(&history), Some(*balance));
                prop_assert_eq!(ledger.balance(item_id).await.unwrap(), *balance);
                prop_assert!(!balance.is_negative());

                let sequences: Vec<i64> = history.iter().map(|e| e.sequence.as_i64()).collect();
                let expected: Vec<i64> = (1..=history.len() as i64).collect();
                prop_assert_eq!(sequences, expected);

                let ordered = history.windows(2).all(|pair| pair[0].timestamp <= pair[1].timestamp);
                prop_assert!(ordered, "timestamps decrease in history of {}", item_id);
            }
            Ok::<(), TestCaseError>(())
        })?;
    }
}

/// A thousand random valid appends replay to the cached balances.
#[test]
fn thousand_valid_appends_replay_to_cache() {
    runtime().block_on(async {
        let ledger = Ledger::new(InMemoryStockStore::new(), LedgerConfig::default());
        let mut expected = [0i64; ITEMS.len()];
        // Deterministic pseudo-random walk that never overdraws
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;

        for tick in 0..1_000i64 {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            let item = (seed % ITEMS.len() as u64) as usize;
            let magnitude = (seed >> 8) as i64 % 50 + 1;
            let delta = if seed & 1 == 0 || expected[item] < magnitude {
                magnitude
            } else {
                -magnitude
            };

            ledger
                .append(NewStockEntry::new(ITEMS[item], delta, Timestamp::logical(tick)))
                .await
                .unwrap();
            expected[item] += delta;
        }

        let replayed = ledger.replay_all().await.unwrap();
        for (i, id) in ITEMS.iter().enumerate() {
            let item_id = ItemId::new(*id);
            assert_eq!(replayed[&item_id], Quantity::new(expected[i]));
            assert_eq!(ledger.balance(&item_id).await.unwrap(), replayed[&item_id]);
        }
        ledger.verify_integrity().await.unwrap();
    });
}

/// A thousand random valid appends to one item replay to its cached balance.
#[test]
fn thousand_valid_appends_to_one_item_replay_to_cache() {
    runtime().block_on(async {
        let ledger = Ledger::new(InMemoryStockStore::new(), LedgerConfig::default());
        let item_id = ItemId::new("bolt-1");
        let mut expected = 0i64;
        let mut seed: u64 = 0x9e37_79b9_7f4a_7c15;

        for i in 0..1_000i64 {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            let magnitude = (seed >> 8) as i64 % 50 + 1;
            let delta = if seed & 1 == 0 || expected < magnitude {
                magnitude
            } else {
                -magnitude
            };

            // Every third entry shares the previous timestamp
            ledger
                .append(NewStockEntry::new("bolt-1", delta, Timestamp::logical(i - i / 3)))
                .await
                .unwrap();
            expected += delta;
        }

        let replayed = ledger.replay_all().await.unwrap();
        assert_eq!(replayed[&item_id], Quantity::new(expected));
        assert_eq!(ledger.balance(&item_id).await.unwrap(), Quantity::new(expected));

        let history = ledger.history_entries(&item_id).await.unwrap();
        assert_eq!(history.len(), 1_000);
        assert!(history.windows(2).all(|pair| pair[0].timestamp <= pair[1].timestamp));
        ledger.verify_integrity().await.unwrap();
    });
}
