//! MVCC registration for in-flight operations
//!
//! Every MVCC-tracked operation is registered as pending with its hybrid time
//! before replication and resolved exactly once, by `replicated` or `aborted`.
//! Readers may only observe times below the oldest unresolved entry.
//!
//! `MvccManager` is the in-process implementation. Leader timestamps come from
//! a `Clock` and are forced strictly increasing; follower timestamps are taken
//! as the leader assigned them.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tabula_core::{Clock, HybridTime, OpId};
use tracing::{debug, warn};

/// Pending-write registry consulted by the operation state machine
pub trait MvccCollaborator: Send + Sync {
    /// Assign a fresh timestamp to a leader operation and register it
    fn add_leader_pending(&self, op_id: OpId) -> HybridTime;

    /// Register a follower operation at the timestamp chosen by the leader
    fn add_follower_pending(&self, hybrid_time: HybridTime, op_id: OpId);

    /// The operation became durable and visible
    fn replicated(&self, hybrid_time: HybridTime, op_id: OpId);

    /// The operation will never become visible
    fn aborted(&self, hybrid_time: HybridTime, op_id: OpId);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingEntry {
    hybrid_time: HybridTime,
    op_id: OpId,
}

#[derive(Debug)]
struct MvccState {
    /// Ordered by hybrid time
    pending: VecDeque<PendingEntry>,
    last_issued: HybridTime,
    last_replicated: HybridTime,
}

/// Reference `MvccCollaborator`
pub struct MvccManager {
    clock: Arc<dyn Clock>,
    state: Mutex<MvccState>,
}

impl MvccManager {
    /// Create a manager issuing leader timestamps from `clock`
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        MvccManager {
            clock,
            state: Mutex::new(MvccState {
                pending: VecDeque::new(),
                last_issued: HybridTime::MIN,
                last_replicated: HybridTime::MIN,
            }),
        }
    }

    /// Highest hybrid time resolved as replicated
    pub fn last_replicated(&self) -> HybridTime {
        self.state.lock().last_replicated
    }

    /// Number of unresolved registrations
    pub fn num_pending(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// True if `op_id` is registered and unresolved
    pub fn is_pending(&self, op_id: OpId) -> bool {
        self.state.lock().pending.iter().any(|e| e.op_id == op_id)
    }

    /// Largest time at which every registered write is resolved
    pub fn safe_time(&self) -> HybridTime {
        let state = self.state.lock();
        match state.pending.front() {
            Some(oldest) => oldest.hybrid_time.decremented(),
            None => state.last_issued.max(state.last_replicated),
        }
    }

    fn remove(state: &mut MvccState, hybrid_time: HybridTime, op_id: OpId) -> Option<usize> {
        let position = state
            .pending
            .iter()
            .position(|e| e.op_id == op_id && e.hybrid_time == hybrid_time)?;
        state.pending.remove(position);
        Some(position)
    }
}

impl MvccCollaborator for MvccManager {
    fn add_leader_pending(&self, op_id: OpId) -> HybridTime {
        let mut state = self.state.lock();
        let mut hybrid_time = self.clock.now();
        if hybrid_time <= state.last_issued {
            hybrid_time = state.last_issued.incremented();
        }
        state.last_issued = hybrid_time;
        state.pending.push_back(PendingEntry {
            hybrid_time,
            op_id,
        });
        hybrid_time
    }

    fn add_follower_pending(&self, hybrid_time: HybridTime, op_id: OpId) {
        let mut state = self.state.lock();
        if hybrid_time <= state.last_issued {
            warn!(
                %op_id,
                %hybrid_time,
                last_issued = %state.last_issued,
                "Follower operation registered out of timestamp order"
            );
        }
        let position = state
            .pending
            .iter()
            .position(|e| e.hybrid_time > hybrid_time)
            .unwrap_or(state.pending.len());
        state.pending.insert(
            position,
            PendingEntry {
                hybrid_time,
                op_id,
            },
        );
        state.last_issued = state.last_issued.max(hybrid_time);
    }

    fn replicated(&self, hybrid_time: HybridTime, op_id: OpId) {
        let mut state = self.state.lock();
        match Self::remove(&mut state, hybrid_time, op_id) {
            Some(0) => {}
            Some(position) => debug!(
                %op_id,
                %hybrid_time,
                position,
                "Operation replicated ahead of older pending operations"
            ),
            None => {
                warn!(%op_id, %hybrid_time, "Replicated operation was not pending");
                return;
            }
        }
        state.last_replicated = state.last_replicated.max(hybrid_time);
    }

    fn aborted(&self, hybrid_time: HybridTime, op_id: OpId) {
        let mut state = self.state.lock();
        if Self::remove(&mut state, hybrid_time, op_id).is_none() {
            warn!(%op_id, %hybrid_time, "Aborted operation was not pending");
        }
    }
}

impl std::fmt::Debug for MvccManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MvccManager")
            .field("num_pending", &state.pending.len())
            .field("last_issued", &state.last_issued)
            .field("last_replicated", &state.last_replicated)
            .finish()
    }
}
