//! Persistence for the stock ledger.
//!
//! Stores the append-only sequence of [`StockEntry`] records per item and the
//! item registry. The [`StockStore`] trait is implemented in memory (tests,
//! single-process deployments) and on PostgreSQL.

pub mod entry;
pub mod error;
pub mod item;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod store;

pub use common::{ItemId, Quantity, Timestamp};
pub use entry::{EntryId, ReasonCode, SequenceNumber, StockEntry, UnknownReasonCode};
pub use error::{Result, StoreError};
pub use item::{ItemOrigin, ItemRecord};
pub use memory::InMemoryStockStore;
pub use postgres::PostgresStockStore;
pub use query::EntryQuery;
pub use store::{AppendValidationError, EntryStream, StockStore, StockStoreExt};
