//! Core type definitions for the local store.

use std::fmt;

/// Sequence number of a frame in the record log.
///
/// Every appended frame gets the next sequence number. On replay the frame
/// with the highest sequence for a key wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SequenceNumber(pub u64);

impl SequenceNumber {
    /// Creates a new sequence number.
    #[must_use]
    pub const fn new(seq: u64) -> Self {
        Self(seq)
    }

    /// Returns the raw sequence value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the next sequence number.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seq:{}", self.0)
    }
}

/// Identifier for one of the record collections kept in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CollectionId(pub u32);

impl CollectionId {
    /// Viewing history records.
    pub const HISTORY: Self = Self(1);
    /// Favorite folders.
    pub const FOLDERS: Self = Self(2);
    /// Resources inside favorite folders.
    pub const RESOURCES: Self = Self(3);

    /// Creates a new collection ID.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Human readable collection name, used in log output.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self.0 {
            1 => "history",
            2 => "folders",
            3 => "resources",
            _ => "unknown",
        }
    }
}

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "col:{}", self.name())
    }
}

/// Current time in milliseconds since the Unix epoch.
#[must_use]
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_number_next() {
        let s1 = SequenceNumber::new(5);
        assert_eq!(s1.next().as_u64(), 6);
        assert!(s1 < s1.next());
    }

    #[test]
    fn collection_display_uses_name() {
        assert_eq!(CollectionId::HISTORY.to_string(), "col:history");
        assert_eq!(CollectionId::new(42).to_string(), "col:unknown");
    }
}
