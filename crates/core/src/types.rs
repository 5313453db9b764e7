//! Core types for the tabula write path
//!
//! This module defines the foundational identifier types:
//! - TabletId: Unique identifier for a tablet (the owning execution context)
//! - OpId: Position of an entry in the replicated log
//! - KeyEntryType: One-byte type tags embedded in on-disk keys

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a tablet
///
/// A TabletId is a wrapper around a UUID v4. Operations carry it in their
/// log prefix so that diagnostics can be attributed to the owning tablet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TabletId(Uuid);

impl TabletId {
    /// Create a new random TabletId using UUID v4
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a TabletId from raw bytes
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// Parse a TabletId from a string representation
    ///
    /// Accepts standard UUID format (with or without hyphens).
    pub fn from_string(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }

    /// Get the raw bytes of this TabletId
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for TabletId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TabletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Identifier of an entry in the replicated log
///
/// Ordered by term first, then index. `OpId::INVALID` marks an id that has
/// not been assigned yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OpId {
    /// Leader term the entry was proposed in
    pub term: i64,
    /// Position of the entry in the log
    pub index: i64,
}

impl OpId {
    /// The unassigned id
    pub const INVALID: OpId = OpId {
        term: -1,
        index: -1,
    };

    /// Create an id from term and index
    pub const fn new(term: i64, index: i64) -> Self {
        OpId { term, index }
    }

    /// True if both components are non-negative
    pub fn is_valid(&self) -> bool {
        self.term >= 0 && self.index >= 0
    }
}

impl Default for OpId {
    fn default() -> Self {
        OpId::INVALID
    }
}

impl fmt::Display for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.term, self.index)
    }
}

/// Type tag for entries embedded in on-disk keys
///
/// ## Tag Values
///
/// These values are part of the on-disk format and MUST NOT change:
/// - GroupEnd = `!` (0x21)
/// - HybridTime = `#` (0x23), always followed by an encoded DocHybridTime
/// - UInt16Hash = `G` (0x47)
/// - UInt64 = `K` (0x4B)
/// - String = `S` (0x53)
/// - StringDescending = `a` (0x61)
/// - SystemColumn = `J` (0x4A)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[repr(u8)]
pub enum KeyEntryType {
    /// End of a group of key components
    GroupEnd = b'!',
    /// Version suffix marker
    HybridTime = b'#',
    /// 16-bit partition hash
    UInt16Hash = b'G',
    /// System column id
    SystemColumn = b'J',
    /// Big-endian 64-bit integer
    UInt64 = b'K',
    /// Zero-encoded string, ascending
    String = b'S',
    /// Complement-zero-encoded string, descending
    StringDescending = b'a',
}

impl KeyEntryType {
    /// Convert to byte representation
    pub fn as_byte(&self) -> u8 {
        *self as u8
    }

    /// Try to create from byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'!' => Some(KeyEntryType::GroupEnd),
            b'#' => Some(KeyEntryType::HybridTime),
            b'G' => Some(KeyEntryType::UInt16Hash),
            b'J' => Some(KeyEntryType::SystemColumn),
            b'K' => Some(KeyEntryType::UInt64),
            b'S' => Some(KeyEntryType::String),
            b'a' => Some(KeyEntryType::StringDescending),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================
    // TabletId Tests
    // ========================================

    #[test]
    fn test_tablet_id_creation_uniqueness() {
        let id1 = TabletId::new();
        let id2 = TabletId::new();
        assert_ne!(id1, id2, "TabletIds should be unique");
    }

    #[test]
    fn test_tablet_id_bytes_roundtrip() {
        let id = TabletId::new();
        let restored = TabletId::from_bytes(*id.as_bytes());
        assert_eq!(id, restored);
    }

    #[test]
    fn test_tablet_id_display_is_compact() {
        let nil = TabletId::from_bytes([0u8; 16]);
        assert_eq!(nil.to_string(), "00000000000000000000000000000000");
    }

    #[test]
    fn test_tablet_id_from_string() {
        let id = TabletId::new();
        let parsed = TabletId::from_string(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
        assert!(TabletId::from_string("not-a-uuid").is_none());
    }

    // ========================================
    // OpId Tests
    // ========================================

    #[test]
    fn test_op_id_invalid_default() {
        assert_eq!(OpId::default(), OpId::INVALID);
        assert!(!OpId::INVALID.is_valid());
        assert!(OpId::new(0, 0).is_valid());
        assert!(!OpId::new(1, -1).is_valid());
    }

    #[test]
    fn test_op_id_ordering_term_first() {
        assert!(OpId::new(1, 100) < OpId::new(2, 1));
        assert!(OpId::new(2, 1) < OpId::new(2, 2));
    }

    #[test]
    fn test_op_id_display() {
        assert_eq!(OpId::new(3, 17).to_string(), "3.17");
        assert_eq!(OpId::INVALID.to_string(), "-1.-1");
    }

    // ========================================
    // KeyEntryType Tests
    // ========================================

    #[test]
    fn test_key_entry_type_bytes() {
        assert_eq!(KeyEntryType::HybridTime.as_byte(), 0x23);
        assert_eq!(KeyEntryType::String.as_byte(), b'S');
        assert_eq!(KeyEntryType::StringDescending.as_byte(), b'a');
    }

    #[test]
    fn test_key_entry_type_from_byte() {
        let all = [
            KeyEntryType::GroupEnd,
            KeyEntryType::HybridTime,
            KeyEntryType::UInt16Hash,
            KeyEntryType::SystemColumn,
            KeyEntryType::UInt64,
            KeyEntryType::String,
            KeyEntryType::StringDescending,
        ];
        for tag in all {
            assert_eq!(KeyEntryType::from_byte(tag.as_byte()), Some(tag));
        }
        assert_eq!(KeyEntryType::from_byte(0x00), None);
        assert_eq!(KeyEntryType::from_byte(0xFF), None);
    }

    #[test]
    fn test_key_entry_type_ordering_matches_bytes() {
        assert!(KeyEntryType::GroupEnd < KeyEntryType::HybridTime);
        assert!(KeyEntryType::String < KeyEntryType::StringDescending);
    }
}
