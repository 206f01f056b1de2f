//! Catalog-driven stock movements.
//!
//! Maps human material names to ledger items for receipts, and expands
//! orders through bill-of-materials recipes into all-or-nothing consumption
//! batches.

pub mod catalog;
pub mod error;
pub mod service;

pub use catalog::{Catalog, RecipeComponent};
pub use error::{CatalogError, FulfillmentError, Result, Shortfall};
pub use service::{FulfilledOrder, FulfillmentService, Order, OrderLine};
