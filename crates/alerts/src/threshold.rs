//! Low-stock threshold configuration.

use std::collections::HashMap;
use std::sync::Arc;

use common::{ItemId, Quantity};

/// Source of configured low-stock thresholds.
///
/// Consulted after the item's own threshold: first the per-item value, then
/// the process-wide default.
pub trait ThresholdSource: Send + Sync {
    /// Configured threshold for one item, if any.
    fn threshold(&self, item_id: &ItemId) -> Option<Quantity>;

    /// Process-wide default threshold, if any.
    fn default_threshold(&self) -> Option<Quantity>;
}

impl<T: ThresholdSource + ?Sized> ThresholdSource for Arc<T> {
    fn threshold(&self, item_id: &ItemId) -> Option<Quantity> {
        (**self).threshold(item_id)
    }

    fn default_threshold(&self) -> Option<Quantity> {
        (**self).default_threshold()
    }
}

/// Two-level threshold table: per-item overrides over a default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThresholdTable {
    default: Option<Quantity>,
    overrides: HashMap<ItemId, Quantity>,
}

impl ThresholdTable {
    /// Creates a table with the given default and no overrides.
    pub fn new(default: Option<Quantity>) -> Self {
        Self {
            default,
            overrides: HashMap::new(),
        }
    }

    pub fn with_override(mut self, item_id: impl Into<ItemId>, threshold: Quantity) -> Self {
        self.overrides.insert(item_id.into(), threshold);
        self
    }

    pub fn set_override(&mut self, item_id: ItemId, threshold: Quantity) {
        self.overrides.insert(item_id, threshold);
    }

    pub fn set_default(&mut self, default: Option<Quantity>) {
        self.default = default;
    }

    pub fn overrides(&self) -> &HashMap<ItemId, Quantity> {
        &self.overrides
    }
}

impl ThresholdSource for ThresholdTable {
    fn threshold(&self, item_id: &ItemId) -> Option<Quantity> {
        self.overrides.get(item_id).copied()
    }

    fn default_threshold(&self) -> Option<Quantity> {
        self.default
    }
}
