use crate::{ItemId, ReasonCode, SequenceNumber, StockEntry, Timestamp};

/// Filter for audit queries over stored entries.
///
/// Results are ordered by item id, then sequence number.
#[derive(Debug, Clone, Default)]
pub struct EntryQuery {
    /// Filter by item.
    pub item_id: Option<ItemId>,

    /// Filter by reason code.
    pub reason: Option<ReasonCode>,

    /// Minimum sequence number (inclusive).
    pub from_sequence: Option<SequenceNumber>,

    /// Maximum sequence number (inclusive).
    pub to_sequence: Option<SequenceNumber>,

    /// Minimum entry timestamp (inclusive).
    pub from_timestamp: Option<Timestamp>,

    /// Maximum entry timestamp (inclusive).
    pub to_timestamp: Option<Timestamp>,

    /// Maximum number of entries to return.
    pub limit: Option<usize>,

    /// Number of entries to skip.
    pub offset: Option<usize>,
}

impl EntryQuery {
    /// Creates a new empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query for a specific item.
    pub fn for_item(item_id: ItemId) -> Self {
        Self {
            item_id: Some(item_id),
            ..Default::default()
        }
    }

    pub fn reason(mut self, reason: ReasonCode) -> Self {
        self.reason = Some(reason);
        self
    }

    pub fn from_sequence(mut self, sequence: SequenceNumber) -> Self {
        self.from_sequence = Some(sequence);
        self
    }

    pub fn to_sequence(mut self, sequence: SequenceNumber) -> Self {
        self.to_sequence = Some(sequence);
        self
    }

    pub fn from_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.from_timestamp = Some(timestamp);
        self
    }

    pub fn to_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.to_timestamp = Some(timestamp);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Returns true if the entry passes every filter (limit/offset aside).
    pub fn matches(&self, entry: &StockEntry) -> bool {
        if let Some(ref item_id) = self.item_id
            && &entry.item_id != item_id
        {
            return false;
        }
        if let Some(reason) = self.reason
            && entry.reason != Some(reason)
        {
            return false;
        }
        if let Some(from) = self.from_sequence
            && entry.sequence < from
        {
            return false;
        }
        if let Some(to) = self.to_sequence
            && entry.sequence > to
        {
            return false;
        }
        if let Some(from) = self.from_timestamp
            && entry.timestamp < from
        {
            return false;
        }
        if let Some(to) = self.to_timestamp
            && entry.timestamp > to
        {
            return false;
        }
        true
    }
}
