//! Stock ledger for the inventory system.
//!
//! This crate provides:
//! - [`Ledger`]: validated, append-only stock entries per item with an
//!   incrementally maintained balance cache
//! - [`ItemLedger`]: the per-item derived state and its validation rules
//! - Replay and integrity verification against the stored history

pub mod config;
pub mod entry;
pub mod error;
pub mod ledger;
pub mod state;

pub use config::{CorrectionPolicy, LedgerConfig};
pub use entry::{AppendReceipt, NewStockEntry};
pub use error::{LedgerError, Result};
pub use ledger::{IntegrityReport, Ledger};
pub use state::{ItemLedger, ItemSnapshot, fold_balance};
