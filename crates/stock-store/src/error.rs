use thiserror::Error;

use crate::store::AppendValidationError;
use crate::{ItemId, SequenceNumber};

/// Errors that can occur when interacting with the stock store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The first appended sequence number for an item did not directly follow
    /// the last stored one.
    #[error(
        "Sequence conflict for item {item_id}: expected sequence {expected}, found {actual}"
    )]
    SequenceConflict {
        item_id: ItemId,
        expected: SequenceNumber,
        actual: SequenceNumber,
    },

    /// The batch handed to `append` was malformed.
    #[error(transparent)]
    InvalidAppend(#[from] AppendValidationError),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored row could not be mapped back to a domain value.
    #[error("Corrupt stored data: {0}")]
    Corrupt(String),
}

/// Result type for stock store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
