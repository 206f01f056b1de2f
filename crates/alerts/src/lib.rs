//! Low-stock alerting over ledger balances.
//!
//! - [`AlertEvaluator`] classifies items as OK or LOW from the ledger's
//!   balances and a resolved threshold
//! - [`ThresholdSource`] / [`ThresholdTable`] supply configured thresholds
//! - [`StockMonitor`] appends entries and re-derives the touched items'
//!   status

pub mod evaluator;
pub mod monitor;
pub mod threshold;

pub use evaluator::{AlertEvaluator, AlertStatus, ItemStatus, LowStockItem};
pub use monitor::{RecordedEntry, StockMonitor};
pub use threshold::{ThresholdSource, ThresholdTable};
