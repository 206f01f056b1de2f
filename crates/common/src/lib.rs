//! Shared types for the stock ledger workspace.

pub mod types;

pub use types::{ItemId, Quantity, Timestamp};
