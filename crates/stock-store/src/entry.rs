use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{ItemId, Quantity, Timestamp};

/// Unique identifier for a stock entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(Uuid);

impl EntryId {
    /// Creates a new random entry ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an entry ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-item sequence number of a stock entry.
///
/// The first entry of an item has sequence 1 and every following entry
/// increments it by exactly one. Sequence 0 means "no entries yet".
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SequenceNumber(i64);

impl SequenceNumber {
    /// Creates a sequence number from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the sequence of an item that has no entries (0).
    pub fn initial() -> Self {
        Self(0)
    }

    /// Returns the sequence of the first entry (1).
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the next sequence number.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for SequenceNumber {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// Why a stock entry was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    /// Inbound goods from a supplier.
    Receipt,
    /// Material used up, e.g. by a production order.
    Consumption,
    /// Manual stock count adjustment.
    Adjustment,
    /// Correction of an earlier mistake. May bypass the non-negative floor
    /// when the ledger is configured to allow it.
    Correction,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::Receipt => "receipt",
            ReasonCode::Consumption => "consumption",
            ReasonCode::Adjustment => "adjustment",
            ReasonCode::Correction => "correction",
        }
    }
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unrecognised reason code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown reason code: {0}")]
pub struct UnknownReasonCode(pub String);

impl FromStr for ReasonCode {
    type Err = UnknownReasonCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "receipt" => Ok(ReasonCode::Receipt),
            "consumption" => Ok(ReasonCode::Consumption),
            "adjustment" => Ok(ReasonCode::Adjustment),
            "correction" => Ok(ReasonCode::Correction),
            other => Err(UnknownReasonCode(other.to_string())),
        }
    }
}

/// An immutable, sequence-numbered quantity change for one item.
///
/// Entries are created by the ledger once an append has been validated and
/// are never modified afterwards; mistakes are fixed by appending a new
/// entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockEntry {
    /// Unique identifier for this entry.
    pub entry_id: EntryId,

    /// The item whose balance changed.
    pub item_id: ItemId,

    /// Position in the item's ledger, starting at 1.
    pub sequence: SequenceNumber,

    /// Signed quantity change (positive = inbound, negative = outbound).
    pub delta: Quantity,

    /// Caller-supplied timestamp, non-decreasing per item.
    pub timestamp: Timestamp,

    /// Optional reason code.
    pub reason: Option<ReasonCode>,

    /// Optional free-text reference (supplier document, order id, ...).
    pub reference: Option<String>,

    /// When the ledger accepted the entry.
    pub recorded_at: DateTime<Utc>,
}

impl StockEntry {
    /// Creates an entry with a fresh entry id, recorded now.
    pub fn new(
        item_id: ItemId,
        sequence: SequenceNumber,
        delta: Quantity,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            entry_id: EntryId::new(),
            item_id,
            sequence,
            delta,
            timestamp,
            reason: None,
            reference: None,
            recorded_at: Utc::now(),
        }
    }

    /// Sets the reason code.
    pub fn with_reason(mut self, reason: Option<ReasonCode>) -> Self {
        self.reason = reason;
        self
    }

    /// Sets the reference.
    pub fn with_reference(mut self, reference: Option<String>) -> Self {
        self.reference = reference;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_id_new_creates_unique_ids() {
        assert_ne!(EntryId::new(), EntryId::new());
    }

    #[test]
    fn sequence_ordering() {
        assert_eq!(SequenceNumber::initial().next(), SequenceNumber::first());
        assert!(SequenceNumber::new(1) < SequenceNumber::new(2));
        assert_eq!(SequenceNumber::new(4).next().as_i64(), 5);
    }

    #[test]
    fn reason_code_string_roundtrip() {
        for reason in [
            ReasonCode::Receipt,
            ReasonCode::Consumption,
            ReasonCode::Adjustment,
            ReasonCode::Correction,
        ] {
            assert_eq!(reason.as_str().parse::<ReasonCode>(), Ok(reason));
        }
        assert_eq!(
            "refund".parse::<ReasonCode>(),
            Err(UnknownReasonCode("refund".to_string()))
        );
    }

    #[test]
    fn reason_code_serializes_snake_case() {
        let json = serde_json::to_string(&ReasonCode::Correction).unwrap();
        assert_eq!(json, "\"correction\"");
    }

    #[test]
    fn entry_carries_optional_fields() {
        let entry = StockEntry::new(
            ItemId::new("bolt-1"),
            SequenceNumber::first(),
            Quantity::new(100),
            Timestamp::logical(1),
        )
        .with_reason(Some(ReasonCode::Receipt))
        .with_reference(Some("PO-17".to_string()));

        assert_eq!(entry.reason, Some(ReasonCode::Receipt));
        assert_eq!(entry.reference.as_deref(), Some("PO-17"));
        assert_eq!(entry.sequence, SequenceNumber::first());
    }
}
