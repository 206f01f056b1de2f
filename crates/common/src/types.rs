use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Unique identifier for a stock item (raw material).
///
/// Item ids are opaque strings supplied by callers. Use [`ItemId::parse`]
/// for external input so blank ids are rejected up front.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Creates an item ID from a string without validation.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Parses an item ID from external input, trimming surrounding
    /// whitespace. Returns `None` for blank input.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// Returns the item ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the ID is empty (never true for parsed IDs).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for ItemId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A signed quantity of stock in base units.
///
/// Quantities are integers; fractional stock is modelled by picking a
/// smaller base unit. All arithmetic is checked.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Quantity(i64);

impl Quantity {
    /// Creates a quantity from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns a zero quantity.
    pub fn zero() -> Self {
        Self(0)
    }

    /// Returns the raw value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }

    /// Adds two quantities, returning `None` on overflow.
    pub fn checked_add(self, other: Quantity) -> Option<Quantity> {
        self.0.checked_add(other.0).map(Self)
    }

    /// Subtracts a quantity, returning `None` on overflow.
    pub fn checked_sub(self, other: Quantity) -> Option<Quantity> {
        self.0.checked_sub(other.0).map(Self)
    }

    /// Multiplies by a scalar, returning `None` on overflow.
    pub fn checked_mul(self, factor: i64) -> Option<Quantity> {
        self.0.checked_mul(factor).map(Self)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }
}

impl std::fmt::Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Quantity {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Quantity> for i64 {
    fn from(quantity: Quantity) -> Self {
        quantity.0
    }
}

/// Ordinal timestamp attached to a stock entry.
///
/// Holds either a logical counter or a wall-clock instant expressed in
/// microseconds since the Unix epoch. It is only checked for per-item
/// monotonicity; entries are ordered by sequence number, never by timestamp.
///
/// Deserializes from an integer (logical counter) or an RFC 3339 string
/// (wall clock). Always serializes as an integer.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize,
)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a logical timestamp.
    pub fn logical(tick: i64) -> Self {
        Self(tick)
    }

    /// Creates a timestamp from a wall-clock instant.
    pub fn from_datetime(instant: DateTime<Utc>) -> Self {
        Self(instant.timestamp_micros())
    }

    /// Returns a timestamp for the current wall-clock time.
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    /// Returns the raw ordinal value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }

    /// Interprets the value as microseconds since the epoch.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_micros(self.0)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Timestamp {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(instant: DateTime<Utc>) -> Self {
        Self::from_datetime(instant)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Logical(i64),
            Wall(DateTime<Utc>),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Logical(tick) => Self::logical(tick),
            Repr::Wall(instant) => Self::from_datetime(instant),
        })
    }
}
