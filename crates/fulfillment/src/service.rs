//! Receiving stock by material name and consuming stock for orders.

use std::collections::BTreeMap;
use std::sync::Arc;

use alerts::{RecordedEntry, StockMonitor, ThresholdSource};
use common::{ItemId, Quantity, Timestamp};
use ledger::{LedgerError, NewStockEntry};
use serde::{Deserialize, Serialize};
use stock_store::StockStore;

use crate::catalog::Catalog;
use crate::error::{FulfillmentError, Result, Shortfall};

/// One line of an order: a SKU and how many units of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub sku: String,
    pub quantity: i64,
}

impl OrderLine {
    pub fn new(sku: impl Into<String>, quantity: i64) -> Self {
        Self {
            sku: sku.into(),
            quantity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,
    pub items: Vec<OrderLine>,

    /// Defaults to the latest timestamp recorded for the order's materials,
    /// or the current wall-clock time when none has any entries.
    #[serde(default)]
    pub timestamp: Option<Timestamp>,
}

impl Order {
    pub fn new(order_id: impl Into<String>, items: Vec<OrderLine>) -> Self {
        Self {
            order_id: order_id.into(),
            items,
            timestamp: None,
        }
    }

    pub fn at(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// The consumption entries an accepted order produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FulfilledOrder {
    pub order_id: String,
    pub consumed: Vec<RecordedEntry>,
}

/// Translates material names and SKUs from the catalog into ledger entries.
pub struct FulfillmentService<S: StockStore, T: ThresholdSource> {
    monitor: StockMonitor<S, T>,
    catalog: Arc<Catalog>,
}

impl<S: StockStore, T: ThresholdSource> Clone for FulfillmentService<S, T> {
    fn clone(&self) -> Self {
        Self {
            monitor: self.monitor.clone(),
            catalog: self.catalog.clone(),
        }
    }
}

impl<S: StockStore, T: ThresholdSource> FulfillmentService<S, T> {
    pub fn new(monitor: StockMonitor<S, T>, catalog: Arc<Catalog>) -> Self {
        Self { monitor, catalog }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn monitor(&self) -> &StockMonitor<S, T> {
        &self.monitor
    }

    /// Registers every catalog material the ledger does not know yet, named
    /// after the catalog entry. Returns how many were registered.
    pub async fn register_materials(&self) -> Result<usize> {
        let ledger = self.monitor.ledger();
        let mut registered = 0;

        for (name, item_id) in self.catalog.materials() {
            if ledger.item(item_id).await.is_some() {
                continue;
            }
            ledger
                .register_item(item_id.clone(), Some(name.to_string()), None)
                .await?;
            registered += 1;
        }

        if registered > 0 {
            tracing::info!(registered, "catalog materials registered");
        }
        Ok(registered)
    }

    /// Records a receipt of `quantity` units of the named material.
    ///
    /// Without a timestamp the receipt reuses the item's last recorded
    /// timestamp, so it never moves an item fed with logical counters onto
    /// the wall clock. The wall clock is only used for items with no entries.
    #[tracing::instrument(skip(self, reference))]
    pub async fn receive(
        &self,
        material_name: &str,
        quantity: i64,
        reference: Option<String>,
        timestamp: Option<Timestamp>,
    ) -> Result<RecordedEntry> {
        let item_id = self
            .catalog
            .material(material_name)
            .ok_or_else(|| FulfillmentError::UnknownMaterial(material_name.to_string()))?;

        if quantity <= 0 {
            return Err(LedgerError::InvalidQuantity {
                item_id: item_id.clone(),
                quantity: Quantity::new(quantity),
                reason: "received quantity must be positive",
            }
            .into());
        }

        let timestamp = match timestamp {
            Some(timestamp) => timestamp,
            None => self.default_timestamp([item_id]).await,
        };
        let mut entry = NewStockEntry::receipt(item_id.clone(), quantity, timestamp);
        if let Some(reference) = reference {
            entry = entry.with_reference(reference);
        }

        Ok(self.monitor.record(entry).await?)
    }

    /// Expands an order into the total quantity needed per material.
    pub fn plan(&self, order: &Order) -> Result<BTreeMap<ItemId, Quantity>> {
        let mut needed: BTreeMap<ItemId, Quantity> = BTreeMap::new();

        for line in &order.items {
            let recipe = self
                .catalog
                .recipe(&line.sku)
                .ok_or_else(|| FulfillmentError::UnknownSku(line.sku.clone()))?;

            if line.quantity <= 0 {
                return Err(FulfillmentError::InvalidLine {
                    sku: line.sku.clone(),
                    reason: "quantity must be positive",
                });
            }

            for component in recipe {
                let item_id = self
                    .catalog
                    .material(&component.material)
                    .ok_or_else(|| FulfillmentError::UnknownMaterial(component.material.clone()))?;

                let total = Quantity::new(component.quantity)
                    .checked_mul(line.quantity)
                    .and_then(|amount| {
                        needed
                            .get(item_id)
                            .copied()
                            .unwrap_or_default()
                            .checked_add(amount)
                    })
                    .ok_or_else(|| FulfillmentError::InvalidLine {
                        sku: line.sku.clone(),
                        reason: "quantity overflows",
                    })?;
                needed.insert(item_id.clone(), total);
            }
        }

        Ok(needed)
    }

    /// Consumes the materials of every order line, all-or-nothing.
    ///
    /// Every material short of stock is reported, ordered by item id.
    #[tracing::instrument(skip(self, order), fields(order_id = %order.order_id))]
    pub async fn fulfill(&self, order: Order) -> Result<FulfilledOrder> {
        let result = self.try_fulfill(order).await;

        let outcome = match &result {
            Ok(_) => "fulfilled",
            Err(FulfillmentError::InsufficientStock { .. }) => "insufficient_stock",
            Err(_) => "rejected",
        };
        metrics::counter!("fulfillment_orders_total", "outcome" => outcome).increment(1);

        result
    }

    /// The latest timestamp recorded for any of `item_ids`, falling back to
    /// the wall clock when none of them has entries.
    async fn default_timestamp<'a>(&self, item_ids: impl IntoIterator<Item = &'a ItemId>) -> Timestamp {
        let ledger = self.monitor.ledger();
        let mut latest: Option<Timestamp> = None;
        for item_id in item_ids {
            if let Some(last) = ledger.snapshot(item_id).await.and_then(|s| s.last_timestamp) {
                latest = latest.max(Some(last));
            }
        }
        latest.unwrap_or_else(Timestamp::now)
    }

    async fn try_fulfill(&self, order: Order) -> Result<FulfilledOrder> {
        let needed = self.plan(&order)?;
        let ledger = self.monitor.ledger();

        let mut shortfalls = Vec::new();
        for (item_id, quantity) in &needed {
            let available = ledger.balance(item_id).await?;
            if available < *quantity {
                shortfalls.push(Shortfall {
                    item_id: item_id.clone(),
                    needed: *quantity,
                    available,
                });
            }
        }

        if !shortfalls.is_empty() {
            tracing::warn!(
                order_id = %order.order_id,
                short = shortfalls.len(),
                "order rejected for insufficient stock"
            );
            return Err(FulfillmentError::InsufficientStock {
                order_id: order.order_id,
                shortfalls,
            });
        }

        let timestamp = match order.timestamp {
            Some(timestamp) => timestamp,
            None => self.default_timestamp(needed.keys()).await,
        };
        let entries = needed
            .into_iter()
            .map(|(item_id, quantity)| {
                NewStockEntry::consumption(item_id, quantity.as_i64(), timestamp)
                    .with_reference(order.order_id.clone())
            })
            .collect();

        let consumed = self.monitor.record_batch(entries).await?;
        tracing::info!(order_id = %order.order_id, materials = consumed.len(), "order fulfilled");

        Ok(FulfilledOrder {
            order_id: order.order_id,
            consumed,
        })
    }
}
