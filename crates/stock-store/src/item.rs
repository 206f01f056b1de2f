use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ItemId, Quantity, StoreError, Timestamp};

/// How an item came to exist in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemOrigin {
    /// Registered explicitly (API call or catalog load).
    Registered,
    /// Created implicitly by the first stock entry referencing it.
    AutoCreated,
}

impl ItemOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemOrigin::Registered => "registered",
            ItemOrigin::AutoCreated => "auto_created",
        }
    }
}

impl FromStr for ItemOrigin {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "registered" => Ok(ItemOrigin::Registered),
            "auto_created" => Ok(ItemOrigin::AutoCreated),
            other => Err(StoreError::Corrupt(format!("unknown item origin '{other}'"))),
        }
    }
}

/// Registry record for a stock item.
///
/// Balances are never stored here; they are always derived from the item's
/// entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub item_id: ItemId,

    /// Display name, not used by balance logic.
    pub name: Option<String>,

    /// Item-specific low-stock threshold. Falls back to the configured
    /// default when unset.
    pub threshold: Option<Quantity>,

    pub origin: ItemOrigin,

    /// Ledger timestamp of the entry that auto-created the item.
    pub first_seen: Option<Timestamp>,

    /// Wall-clock instant the record was created.
    pub registered_at: DateTime<Utc>,
}

impl ItemRecord {
    /// Creates a record for an explicitly registered item.
    pub fn registered(item_id: ItemId) -> Self {
        Self {
            item_id,
            name: None,
            threshold: None,
            origin: ItemOrigin::Registered,
            first_seen: None,
            registered_at: Utc::now(),
        }
    }

    /// Creates a record for an item first seen in a stock entry.
    pub fn auto_created(item_id: ItemId, first_seen: Timestamp) -> Self {
        Self {
            item_id,
            name: None,
            threshold: None,
            origin: ItemOrigin::AutoCreated,
            first_seen: Some(first_seen),
            registered_at: Utc::now(),
        }
    }

    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }

    pub fn with_threshold(mut self, threshold: Option<Quantity>) -> Self {
        self.threshold = threshold;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registered_item_has_no_first_seen() {
        let record = ItemRecord::registered(ItemId::new("steel-sheet"))
            .with_name(Some("Steel sheet".to_string()))
            .with_threshold(Some(Quantity::new(10)));

        assert_eq!(record.origin, ItemOrigin::Registered);
        assert!(record.first_seen.is_none());
        assert_eq!(record.threshold, Some(Quantity::new(10)));
    }

    #[test]
    fn auto_created_item_remembers_first_timestamp() {
        let record = ItemRecord::auto_created(ItemId::new("bolt-1"), Timestamp::logical(3));
        assert_eq!(record.origin, ItemOrigin::AutoCreated);
        assert_eq!(record.first_seen, Some(Timestamp::logical(3)));
    }

    #[test]
    fn origin_parses_stored_strings() {
        assert_eq!(
            "auto_created".parse::<ItemOrigin>().unwrap(),
            ItemOrigin::AutoCreated
        );
        assert!("deleted".parse::<ItemOrigin>().is_err());
    }
}
