//! Exclusive permit for schema changes
//!
//! At most one schema change may be in flight per tablet. The permit is taken
//! before the operation is created and released when the operation resolves.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Source of the single schema-change permit of a tablet
#[derive(Debug, Default, Clone)]
pub struct SchemaPermits {
    held: Arc<AtomicBool>,
}

impl SchemaPermits {
    /// Create a pool with the permit available
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the permit if nobody holds it
    pub fn try_acquire(&self) -> Option<PermitToken> {
        self.held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| PermitToken {
                held: Arc::clone(&self.held),
            })
    }

    /// True while a token is alive
    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }
}

/// Proof of holding the schema-change permit; dropping it releases the permit
pub struct PermitToken {
    held: Arc<AtomicBool>,
}

impl Drop for PermitToken {
    fn drop(&mut self) {
        self.held.store(false, Ordering::Release);
    }
}

impl fmt::Debug for PermitToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PermitToken")
    }
}
