//! Hybrid logical timestamps
//!
//! A `HybridTime` packs a physical clock reading (microseconds since the Unix
//! epoch) and a logical counter into a single `u64`:
//!
//! ```text
//! | physical micros (52 bits) | logical (12 bits) |
//! ```
//!
//! Comparing the packed value compares physical time first and the logical
//! counter second, which is the serialization order of writes.
//!
//! A `DocHybridTime` extends this with a per-operation write id so that
//! several entries written by one operation at the same hybrid time still get
//! distinct, ordered versions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of low bits reserved for the logical component
pub const BITS_FOR_LOGICAL_COMPONENT: u32 = 12;

/// Mask selecting the logical component
pub const LOGICAL_BITS_MASK: u64 = (1 << BITS_FOR_LOGICAL_COMPONENT) - 1;

/// Hybrid logical timestamp
///
/// ## Invariants
///
/// - `HybridTime::INVALID` means "not assigned" and compares greater than
///   every valid value; it is never issued by a clock
/// - Ordering of valid values is the ordering of the packed `u64`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HybridTime(u64);

impl HybridTime {
    /// Smallest valid hybrid time
    pub const MIN: HybridTime = HybridTime(0);

    /// Largest valid hybrid time
    pub const MAX: HybridTime = HybridTime(u64::MAX - 1);

    /// Sentinel for an unassigned hybrid time
    pub const INVALID: HybridTime = HybridTime(u64::MAX);

    /// Create from the packed representation
    #[inline]
    pub const fn from_u64(value: u64) -> Self {
        HybridTime(value)
    }

    /// Create from a physical reading and a logical counter
    ///
    /// The logical value is truncated to the reserved bit width.
    #[inline]
    pub const fn from_micros_and_logical(micros: u64, logical: u64) -> Self {
        HybridTime((micros << BITS_FOR_LOGICAL_COMPONENT) | (logical & LOGICAL_BITS_MASK))
    }

    /// Create from a physical reading with logical counter zero
    #[inline]
    pub const fn from_micros(micros: u64) -> Self {
        Self::from_micros_and_logical(micros, 0)
    }

    /// Packed representation
    #[inline]
    pub const fn to_u64(&self) -> u64 {
        self.0
    }

    /// Physical component in microseconds
    #[inline]
    pub const fn physical_micros(&self) -> u64 {
        self.0 >> BITS_FOR_LOGICAL_COMPONENT
    }

    /// Logical component
    #[inline]
    pub const fn logical(&self) -> u64 {
        self.0 & LOGICAL_BITS_MASK
    }

    /// True unless this is the `INVALID` sentinel
    #[inline]
    pub const fn is_valid(&self) -> bool {
        self.0 != u64::MAX
    }

    /// The next representable hybrid time
    ///
    /// Saturates at `MAX`.
    pub fn incremented(&self) -> Self {
        if self.0 >= Self::MAX.0 {
            Self::MAX
        } else {
            HybridTime(self.0 + 1)
        }
    }

    /// The previous representable hybrid time
    ///
    /// Saturates at `MIN`.
    pub fn decremented(&self) -> Self {
        HybridTime(self.0.saturating_sub(1))
    }
}

impl Default for HybridTime {
    fn default() -> Self {
        HybridTime::INVALID
    }
}

impl fmt::Display for HybridTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_valid() {
            return write!(f, "<invalid>");
        }
        let micros = self.physical_micros();
        write!(f, "{{ physical: {}", micros)?;
        if self.logical() != 0 {
            write!(f, " logical: {}", self.logical())?;
        }
        write!(f, " }}")
    }
}

/// Hybrid time plus the write id of one entry within an operation
///
/// Ordered by hybrid time, then write id. This is the version appended to
/// every on-disk key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocHybridTime {
    hybrid_time: HybridTime,
    write_id: u32,
}

impl DocHybridTime {
    /// Smallest version
    pub const MIN: DocHybridTime = DocHybridTime {
        hybrid_time: HybridTime::MIN,
        write_id: 0,
    };

    /// Largest version
    pub const MAX: DocHybridTime = DocHybridTime {
        hybrid_time: HybridTime::MAX,
        write_id: u32::MAX,
    };

    /// Create a version
    pub const fn new(hybrid_time: HybridTime, write_id: u32) -> Self {
        DocHybridTime {
            hybrid_time,
            write_id,
        }
    }

    /// Hybrid time of the owning operation
    #[inline]
    pub const fn hybrid_time(&self) -> HybridTime {
        self.hybrid_time
    }

    /// Index of the entry within its operation
    #[inline]
    pub const fn write_id(&self) -> u32 {
        self.write_id
    }
}

impl fmt::Display for DocHybridTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.write_id == 0 {
            write!(f, "HT{}", self.hybrid_time)
        } else {
            write!(f, "HT{} w: {}", self.hybrid_time, self.write_id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hybrid_time_components() {
        let ht = HybridTime::from_micros_and_logical(1_000_000, 7);
        assert_eq!(ht.physical_micros(), 1_000_000);
        assert_eq!(ht.logical(), 7);
        assert_eq!(ht.to_u64(), (1_000_000 << 12) | 7);
    }

    #[test]
    fn test_hybrid_time_logical_is_truncated() {
        let ht = HybridTime::from_micros_and_logical(1, LOGICAL_BITS_MASK + 1);
        assert_eq!(ht.logical(), 0);
        assert_eq!(ht.physical_micros(), 1);
    }

    #[test]
    fn test_hybrid_time_ordering() {
        let a = HybridTime::from_micros_and_logical(10, 4095);
        let b = HybridTime::from_micros(11);
        assert!(a < b, "physical component dominates");
        assert!(HybridTime::from_micros_and_logical(10, 1) < a);
    }

    #[test]
    fn test_hybrid_time_invalid_is_distinct() {
        assert!(!HybridTime::INVALID.is_valid());
        assert!(HybridTime::MIN.is_valid());
        assert!(HybridTime::MAX.is_valid());
        assert_eq!(HybridTime::default(), HybridTime::INVALID);
        assert_ne!(HybridTime::MAX, HybridTime::INVALID);
    }

    #[test]
    fn test_hybrid_time_increment_saturates() {
        assert_eq!(HybridTime::MAX.incremented(), HybridTime::MAX);
        assert_eq!(HybridTime::MIN.decremented(), HybridTime::MIN);
        assert_eq!(HybridTime::from_u64(5).incremented(), HybridTime::from_u64(6));
    }

    #[test]
    fn test_hybrid_time_display() {
        assert_eq!(HybridTime::INVALID.to_string(), "<invalid>");
        assert_eq!(HybridTime::from_micros(42).to_string(), "{ physical: 42 }");
        assert_eq!(
            HybridTime::from_micros_and_logical(42, 3).to_string(),
            "{ physical: 42 logical: 3 }"
        );
    }

    #[test]
    fn test_doc_hybrid_time_ordering() {
        let ht = HybridTime::from_micros(100);
        let a = DocHybridTime::new(ht, 0);
        let b = DocHybridTime::new(ht, 1);
        let c = DocHybridTime::new(ht.incremented(), 0);
        assert!(a < b);
        assert!(b < c);
        assert!(DocHybridTime::MIN < a);
        assert!(c < DocHybridTime::MAX);
    }

    #[test]
    fn test_doc_hybrid_time_display() {
        let ht = HybridTime::from_micros(1);
        assert_eq!(DocHybridTime::new(ht, 0).to_string(), "HT{ physical: 1 }");
        assert_eq!(
            DocHybridTime::new(ht, 2).to_string(),
            "HT{ physical: 1 } w: 2"
        );
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn components_roundtrip(micros in 0u64..(1 << 51), logical in 0u64..=LOGICAL_BITS_MASK) {
                let ht = HybridTime::from_micros_and_logical(micros, logical);
                prop_assert_eq!(ht.physical_micros(), micros);
                prop_assert_eq!(ht.logical(), logical);
                prop_assert!(ht.is_valid());
            }

            #[test]
            fn order_follows_physical_then_logical(
                a in (0u64..(1 << 51), 0u64..=LOGICAL_BITS_MASK),
                b in (0u64..(1 << 51), 0u64..=LOGICAL_BITS_MASK),
            ) {
                let ha = HybridTime::from_micros_and_logical(a.0, a.1);
                let hb = HybridTime::from_micros_and_logical(b.0, b.1);
                prop_assert_eq!(ha.cmp(&hb), a.cmp(&b));
            }
        }
    }
}
