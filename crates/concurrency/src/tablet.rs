//! Owning tablet of an operation
//!
//! Operations hold only a weak reference to their owner. `TabletContext` is
//! the surface they need from it; `Tablet` is the in-process owner that wires
//! a clock, an `MvccManager`, a pending tracker and a `RawKvStore` together.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use tabula_core::{Clock, Error, Result, TabletConfig, TabletId};
use tabula_storage::RawKvStore;

use crate::mvcc::{MvccCollaborator, MvccManager};
use crate::pending::PendingOperationTracker;
use crate::permit::SchemaPermits;

/// What an operation reads from its owning tablet
pub trait TabletContext: Send + Sync {
    /// Identity used in log prefixes
    fn tablet_id(&self) -> TabletId;

    /// Hybrid time source for kinds that bypass MVCC
    fn clock(&self) -> &dyn Clock;

    /// Pending-write registry
    fn mvcc(&self) -> &dyn MvccCollaborator;

    /// Current value of the tablet's monotonic counter
    fn monotonic_counter(&self) -> i64;

    /// Operations between assignment and resolution
    fn pending_operations(&self) -> &PendingOperationTracker;

    /// Storage the apply hooks write to
    fn storage(&self) -> &dyn RawKvStore;

    /// Tablet configuration
    fn config(&self) -> &TabletConfig;
}

/// In-process tablet
pub struct Tablet {
    id: TabletId,
    clock: Arc<dyn Clock>,
    mvcc: MvccManager,
    monotonic_counter: AtomicI64,
    pending: PendingOperationTracker,
    storage: Arc<dyn RawKvStore>,
    schema_permits: SchemaPermits,
    config: TabletConfig,
}

impl Tablet {
    /// Create a tablet after validating `config`
    pub fn new(
        id: TabletId,
        config: TabletConfig,
        clock: Arc<dyn Clock>,
        storage: Arc<dyn RawKvStore>,
    ) -> Result<Self> {
        config
            .validate()
            .map_err(|e| Error::InvalidArgument(e.to_string()))?;
        Ok(Tablet {
            id,
            mvcc: MvccManager::new(Arc::clone(&clock)),
            clock,
            monotonic_counter: AtomicI64::new(0),
            pending: PendingOperationTracker::new(),
            storage,
            schema_permits: SchemaPermits::new(),
            config,
        })
    }

    /// Concrete MVCC manager, for inspection
    pub fn mvcc_manager(&self) -> &MvccManager {
        &self.mvcc
    }

    /// Schema-change permit pool
    pub fn schema_permits(&self) -> &SchemaPermits {
        &self.schema_permits
    }

    /// Bump the monotonic counter, returning the new value
    pub fn increment_monotonic_counter(&self) -> i64 {
        self.monotonic_counter.fetch_add(1, Ordering::AcqRel) + 1
    }
}

impl TabletContext for Tablet {
    fn tablet_id(&self) -> TabletId {
        self.id
    }

    fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    fn mvcc(&self) -> &dyn MvccCollaborator {
        &self.mvcc
    }

    fn monotonic_counter(&self) -> i64 {
        self.monotonic_counter.load(Ordering::Acquire)
    }

    fn pending_operations(&self) -> &PendingOperationTracker {
        &self.pending
    }

    fn storage(&self) -> &dyn RawKvStore {
        self.storage.as_ref()
    }

    fn config(&self) -> &TabletConfig {
        &self.config
    }
}

impl fmt::Debug for Tablet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tablet")
            .field("id", &self.id)
            .field("mvcc", &self.mvcc)
            .field("pending", &self.pending.len())
            .finish()
    }
}
