//! Clock sources for hybrid time
//!
//! `HybridClock` reads the system clock and never goes backwards: when the
//! physical reading does not advance past the last issued value, the logical
//! component is bumped instead. `LogicalClock` is a manually driven clock for
//! deterministic tests and replay tooling.

use crate::hybrid_time::HybridTime;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of hybrid timestamps
pub trait Clock: Send + Sync {
    /// Current hybrid time
    ///
    /// Successive calls on the same clock return strictly increasing values.
    fn now(&self) -> HybridTime;
}

/// System-clock backed hybrid clock
#[derive(Debug, Default)]
pub struct HybridClock {
    last: AtomicU64,
}

impl HybridClock {
    /// Create a clock that has issued nothing yet
    pub fn new() -> Self {
        Self::default()
    }

    fn physical_now() -> HybridTime {
        let micros = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_micros() as u64;
        HybridTime::from_micros(micros)
    }
}

impl Clock for HybridClock {
    fn now(&self) -> HybridTime {
        let physical = Self::physical_now().to_u64();
        let mut last = self.last.load(Ordering::Acquire);
        loop {
            let next = physical.max(last + 1);
            match self
                .last
                .compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return HybridTime::from_u64(next),
                Err(current) => last = current,
            }
        }
    }
}

/// Manually advanced clock
///
/// Every call to `now` returns the next value after the current one.
#[derive(Debug)]
pub struct LogicalClock {
    current: AtomicU64,
}

impl LogicalClock {
    /// Create a clock whose first reading is `start + 1`
    pub fn new(start: HybridTime) -> Self {
        LogicalClock {
            current: AtomicU64::new(start.to_u64()),
        }
    }

    /// Last value handed out (or the start value)
    pub fn peek(&self) -> HybridTime {
        HybridTime::from_u64(self.current.load(Ordering::Acquire))
    }

    /// Move the clock forward to at least `ht`
    pub fn advance_to(&self, ht: HybridTime) {
        self.current.fetch_max(ht.to_u64(), Ordering::AcqRel);
    }
}

impl Clock for LogicalClock {
    fn now(&self) -> HybridTime {
        HybridTime::from_u64(self.current.fetch_add(1, Ordering::AcqRel) + 1)
    }
}
