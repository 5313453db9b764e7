//! Registry of operations between assignment and resolution
//!
//! An operation enters the tracker when it becomes leader- or follower-pending
//! and leaves it when it is replicated or aborted.
//!
//! - `DashMap` keyed by `OpId`: sharded, so registrations from concurrent
//!   operations do not serialize on one lock

use dashmap::DashMap;
use tabula_core::{HybridTime, OpId};

use crate::round::OperationType;

/// What the tracker knows about one pending operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingOperation {
    /// Kind of the operation
    pub op_type: OperationType,
    /// Assigned hybrid time
    pub hybrid_time: HybridTime,
}

/// Pending operations of one tablet
#[derive(Debug, Default)]
pub struct PendingOperationTracker {
    operations: DashMap<OpId, PendingOperation>,
}

impl PendingOperationTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an operation
    ///
    /// Returns false if `op_id` was already registered; the existing entry is
    /// kept.
    pub fn add(&self, op_id: OpId, op_type: OperationType, hybrid_time: HybridTime) -> bool {
        match self.operations.entry(op_id) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(PendingOperation {
                    op_type,
                    hybrid_time,
                });
                true
            }
        }
    }

    /// Unregister an operation, returning true if it was present
    pub fn remove(&self, op_id: OpId) -> bool {
        self.operations.remove(&op_id).is_some()
    }

    /// Look up a pending operation
    pub fn get(&self, op_id: OpId) -> Option<PendingOperation> {
        self.operations.get(&op_id).map(|entry| *entry.value())
    }

    /// True if `op_id` is pending
    pub fn contains(&self, op_id: OpId) -> bool {
        self.operations.contains_key(&op_id)
    }

    /// Number of pending operations
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// True if nothing is pending
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Pending ids in log order
    pub fn op_ids(&self) -> Vec<OpId> {
        let mut ids: Vec<OpId> = self.operations.iter().map(|entry| *entry.key()).collect();
        ids.sort();
        ids
    }
}
