//! Fulfillment error types.

use common::{ItemId, Quantity};
use ledger::LedgerError;
use serde::Serialize;
use thiserror::Error;

/// A material an order needs more of than is in stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Shortfall {
    pub item_id: ItemId,
    pub needed: Quantity,
    pub available: Quantity,
}

/// Errors raised while loading or validating a catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read catalog: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid catalog JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Recipe for SKU {sku} references unknown material {material}")]
    UnknownMaterial { sku: String, material: String },

    #[error("Recipe for SKU {sku} has a non-positive quantity of {material}")]
    InvalidComponent { sku: String, material: String },

    #[error("Material {material} maps to a blank item id")]
    BlankMaterialId { material: String },

    #[error("Threshold for {item_id} must not be negative, got {threshold}")]
    NegativeThreshold { item_id: ItemId, threshold: Quantity },
}

/// Errors that can occur while receiving stock or fulfilling orders.
#[derive(Debug, Error)]
pub enum FulfillmentError {
    #[error("Unknown SKU: {0}")]
    UnknownSku(String),

    #[error("Unknown material: {0}")]
    UnknownMaterial(String),

    #[error("Invalid order line for SKU {sku}: {reason}")]
    InvalidLine { sku: String, reason: &'static str },

    #[error("Insufficient stock for order {order_id}: {} material(s) short", shortfalls.len())]
    InsufficientStock {
        order_id: String,
        shortfalls: Vec<Shortfall>,
    },

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl FulfillmentError {
    pub fn kind(&self) -> &'static str {
        match self {
            FulfillmentError::UnknownSku(_) => "unknown_sku",
            FulfillmentError::UnknownMaterial(_) => "unknown_material",
            FulfillmentError::InvalidLine { .. } => "bad_request",
            FulfillmentError::InsufficientStock { .. } => "insufficient_stock",
            FulfillmentError::Catalog(_) => "bad_request",
            FulfillmentError::Ledger(e) => e.kind(),
        }
    }
}

/// Result type for fulfillment operations.
pub type Result<T> = std::result::Result<T, FulfillmentError>;
