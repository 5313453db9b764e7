//! Replicated operation state machine
//!
//! An `Operation` is one write-path operation from creation to resolution:
//!
//! ```text
//! Created --set_consensus_round--> Bound --added_to_leader---> LeaderPending ---+--replicated--> Replicated
//!                                        --added_to_follower-> FollowerPending -+--aborted-----> Aborted
//! ```
//!
//! `aborted` is accepted from every non-terminal state, including `Created`
//! for an operation that never reached consensus. Terminal states absorb.
//!
//! ## Locking
//!
//! Transitions take the state lock. The bound round, the op id and the hybrid
//! time are republished into lock-free mirrors when they are set, so readers
//! on other threads see either the unset value or the final one and never
//! block a transition. Lock order is state, then replicate message, then kind.
//!
//! The completion callback runs exactly once, after every lock is released.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::Mutex;
use tabula_core::{Error, HybridTime, OpId, Result};
use tracing::{debug, error, warn};

use crate::completion::{CompletionCallback, CompletionStatus};
use crate::kind::{ApplyContext, OperationKind};
use crate::round::{ConsensusRound, OperationType};
use crate::tablet::TabletContext;

/// Lifecycle state of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationState {
    /// Not yet bound to a consensus round
    Created,
    /// Bound, waiting for leader or follower assignment
    Bound,
    /// Timestamp assigned by this replica as leader
    LeaderPending,
    /// Timestamp taken from the leader's entry
    FollowerPending,
    /// Applied and completed
    Replicated,
    /// Will never be applied
    Aborted,
}

impl OperationState {
    /// True between assignment and resolution
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            OperationState::LeaderPending | OperationState::FollowerPending
        )
    }

    /// True once replicated or aborted
    pub fn is_terminal(&self) -> bool {
        matches!(self, OperationState::Replicated | OperationState::Aborted)
    }
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationState::Created => "created",
            OperationState::Bound => "bound",
            OperationState::LeaderPending => "leader-pending",
            OperationState::FollowerPending => "follower-pending",
            OperationState::Replicated => "replicated",
            OperationState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// `OpId` readable without a lock
///
/// Written at most once with a valid id (rewriting the same id is allowed).
/// The index is published before the term, so a reader that observes a valid
/// term also observes the matching index.
#[derive(Debug)]
pub struct AtomicOpId {
    term: AtomicI64,
    index: AtomicI64,
}

impl AtomicOpId {
    /// Create holding `op_id`
    pub fn new(op_id: OpId) -> Self {
        AtomicOpId {
            term: AtomicI64::new(op_id.term),
            index: AtomicI64::new(op_id.index),
        }
    }

    /// Publish `op_id`
    pub fn store(&self, op_id: OpId) {
        self.index.store(op_id.index, Ordering::Release);
        self.term.store(op_id.term, Ordering::Release);
    }

    /// Read the published id, or `OpId::INVALID`
    pub fn load(&self) -> OpId {
        let term = self.term.load(Ordering::Acquire);
        if term == OpId::INVALID.term {
            return OpId::INVALID;
        }
        OpId::new(term, self.index.load(Ordering::Acquire))
    }
}

impl Default for AtomicOpId {
    fn default() -> Self {
        Self::new(OpId::INVALID)
    }
}

#[derive(Debug)]
struct MutableState {
    state: OperationState,
    round: Option<Arc<ConsensusRound>>,
    op_id: OpId,
    committed_op_id: OpId,
    hybrid_time: HybridTime,
    /// Set while `replicated` runs the apply hook
    applying: bool,
}

/// One operation on the write path
pub struct Operation {
    operation_type: OperationType,
    tablet: Weak<dyn TabletContext>,
    kind: Mutex<OperationKind>,
    state: Mutex<MutableState>,
    round_mirror: OnceLock<Arc<ConsensusRound>>,
    op_id_mirror: AtomicOpId,
    hybrid_time_mirror: AtomicU64,
    complete: AtomicBool,
    completion_callback: Mutex<Option<CompletionCallback>>,
}

impl Operation {
    /// Create an operation owned by `tablet`
    ///
    /// Only a weak reference to the tablet is kept.
    pub fn new<T>(kind: impl Into<OperationKind>, tablet: &Arc<T>) -> Self
    where
        T: TabletContext + 'static,
    {
        let tablet: Weak<T> = Arc::downgrade(tablet);
        let tablet: Weak<dyn TabletContext> = tablet;
        Self::with_owner(kind, tablet)
    }

    /// Create an operation from an already weak owner reference
    pub fn with_owner(kind: impl Into<OperationKind>, tablet: Weak<dyn TabletContext>) -> Self {
        let kind = kind.into();
        Operation {
            operation_type: kind.operation_type(),
            tablet,
            kind: Mutex::new(kind),
            state: Mutex::new(MutableState {
                state: OperationState::Created,
                round: None,
                op_id: OpId::INVALID,
                committed_op_id: OpId::INVALID,
                hybrid_time: HybridTime::INVALID,
                applying: false,
            }),
            round_mirror: OnceLock::new(),
            op_id_mirror: AtomicOpId::default(),
            hybrid_time_mirror: AtomicU64::new(HybridTime::INVALID.to_u64()),
            complete: AtomicBool::new(false),
            completion_callback: Mutex::new(None),
        }
    }

    /// Install the callback that receives the final status
    pub fn set_completion_callback(&self, callback: CompletionCallback) {
        *self.completion_callback.lock() = Some(callback);
    }

    // === Owner ===

    /// Owning tablet
    ///
    /// # Panics
    ///
    /// If the tablet has been destroyed. Operations must not outlive their
    /// tablet on the apply path; use [`Operation::tablet_safe`] where they may.
    pub fn tablet(&self) -> Arc<dyn TabletContext> {
        match self.tablet.upgrade() {
            Some(tablet) => tablet,
            None => {
                error!(operation = %self, "Tablet referenced by operation has been destroyed");
                panic!("tablet referenced by operation {} has been destroyed", self);
            }
        }
    }

    /// Owning tablet, or `IllegalState` if it has been destroyed
    pub fn tablet_safe(&self) -> Result<Arc<dyn TabletContext>> {
        self.tablet.upgrade().ok_or_else(|| {
            Error::illegal_state(format!(
                "tablet referenced by operation {} has been destroyed",
                self
            ))
        })
    }

    // === Accessors ===

    /// Kind of the operation
    pub fn operation_type(&self) -> OperationType {
        self.operation_type
    }

    /// Log position, or `OpId::INVALID` before binding
    pub fn op_id(&self) -> OpId {
        self.op_id_mirror.load()
    }

    /// Committed position recorded at assignment
    pub fn committed_op_id(&self) -> OpId {
        self.state.lock().committed_op_id
    }

    /// Assigned hybrid time
    ///
    /// Only meaningful after assignment; see [`Operation::has_hybrid_time`].
    pub fn hybrid_time(&self) -> HybridTime {
        let hybrid_time = self.hybrid_time_even_if_unset();
        debug_assert!(hybrid_time.is_valid(), "hybrid time read before assignment");
        hybrid_time
    }

    /// Assigned hybrid time, `HybridTime::INVALID` if not assigned yet
    pub fn hybrid_time_even_if_unset(&self) -> HybridTime {
        HybridTime::from_u64(self.hybrid_time_mirror.load(Ordering::Acquire))
    }

    /// True once a hybrid time is assigned
    pub fn has_hybrid_time(&self) -> bool {
        self.hybrid_time_even_if_unset().is_valid()
    }

    /// Bound round, if any
    pub fn consensus_round(&self) -> Option<&Arc<ConsensusRound>> {
        self.round_mirror.get()
    }

    /// Current lifecycle state
    pub fn state(&self) -> OperationState {
        self.state.lock().state
    }

    /// True once the completion status has been delivered
    pub fn is_complete(&self) -> bool {
        self.complete.load(Ordering::Acquire)
    }

    /// Access the kind, e.g. to inspect a follower's adopted request
    pub fn with_kind<R>(&self, f: impl FnOnce(&OperationKind) -> R) -> R {
        f(&self.kind.lock())
    }

    /// Prefix for log lines about this operation
    pub fn log_prefix(&self) -> String {
        match self.tablet.upgrade() {
            Some(tablet) => format!("T {} {:p}: ", tablet.tablet_id(), self),
            None => format!("T <destroyed> {:p}: ", self),
        }
    }

    // === Transitions ===

    /// Bind the operation to its consensus round
    pub fn set_consensus_round(&self, round: Arc<ConsensusRound>) -> Result<()> {
        let round_id = round.id();
        if !round_id.is_valid() {
            return Err(Error::illegal_state(format!(
                "{}cannot bind to round without a valid id",
                self.log_prefix()
            )));
        }
        {
            let mut state = self.state.lock();
            if state.state != OperationState::Created {
                return Err(Error::illegal_state(format!(
                    "{}cannot bind to round {} while {}",
                    self.log_prefix(),
                    round_id,
                    state.state
                )));
            }
            state.round = Some(Arc::clone(&round));
            state.op_id = round_id;
            state.state = OperationState::Bound;
            let _ = self.round_mirror.set(Arc::clone(&round));
            self.op_id_mirror.store(round_id);
        }

        let mut msg = round.replicate_msg();
        self.kind
            .lock()
            .hooks_mut()
            .update_request_from_consensus_round(&mut msg);
        Ok(())
    }

    /// Assign a hybrid time as leader and register as pending
    pub fn added_to_leader(&self) -> Result<()> {
        let tablet = self.tablet();
        let round = self.bound_round()?;
        let op_id = round.id();
        let committed_op_id = round.committed_op_id();

        let use_mvcc = self.kind.lock().hooks().use_mvcc();
        let hybrid_time = if use_mvcc {
            tablet.mvcc().add_leader_pending(op_id)
        } else {
            tablet.clock().now()
        };

        {
            let mut state = self.state.lock();
            self.assign_hybrid_time(&mut state, hybrid_time);
            state.op_id = op_id;
            state.committed_op_id = committed_op_id;
            self.op_id_mirror.store(op_id);

            let mut msg = round.replicate_msg();
            msg.id = op_id;
            msg.committed_op_id = committed_op_id;
            msg.hybrid_time = Some(hybrid_time);
            msg.monotonic_counter = tablet.monotonic_counter();
            state.state = OperationState::LeaderPending;
        }

        self.added_as_pending(tablet.as_ref(), op_id, hybrid_time);
        debug!(
            tablet_id = %tablet.tablet_id(),
            %op_id,
            %hybrid_time,
            op_type = %self.operation_type,
            "Operation added as leader"
        );
        Ok(())
    }

    /// Take the leader's hybrid time from the entry and register as pending
    pub fn added_to_follower(&self) -> Result<()> {
        let tablet = self.tablet();
        let round = self.bound_round()?;

        let (op_id, hybrid_time) = {
            let mut state = self.state.lock();
            let msg = round.replicate_msg();
            let hybrid_time = msg
                .hybrid_time
                .filter(HybridTime::is_valid)
                .ok_or_else(|| {
                    Error::illegal_state(format!(
                        "{}replicated entry {} carries no hybrid time",
                        self.log_prefix(),
                        round.id()
                    ))
                })?;
            self.assign_hybrid_time(&mut state, hybrid_time);
            state.committed_op_id = msg.committed_op_id;
            state.state = OperationState::FollowerPending;
            (state.op_id, hybrid_time)
        };

        if self.kind.lock().hooks().use_mvcc() {
            tablet.mvcc().add_follower_pending(hybrid_time, op_id);
        }
        self.added_as_pending(tablet.as_ref(), op_id, hybrid_time);
        debug!(
            tablet_id = %tablet.tablet_id(),
            %op_id,
            %hybrid_time,
            op_type = %self.operation_type,
            "Operation added as follower"
        );
        Ok(())
    }

    /// Apply the replicated operation and complete it
    ///
    /// The operation is claimed for resolution before the apply hook runs, so
    /// an `aborted` racing with it is ignored. If the apply hook fails, the
    /// claim is dropped, the error is returned, MVCC is not notified and the
    /// operation stays pending; the caller is expected to abort it.
    pub fn replicated(&self, leader_term: i64) -> Result<()> {
        let tablet = self.tablet();
        let (op_id, hybrid_time, was_pending) = {
            let mut state = self.state.lock();
            if state.state.is_terminal() || state.round.is_none() || state.applying {
                return Err(Error::illegal_state(format!(
                    "{}cannot replicate while {}{}",
                    self.log_prefix(),
                    state.state,
                    if state.applying { " and applying" } else { "" }
                )));
            }
            if !state.hybrid_time.is_valid() {
                return Err(Error::illegal_state(format!(
                    "{}cannot replicate without a hybrid time",
                    self.log_prefix()
                )));
            }
            state.applying = true;
            (state.op_id, state.hybrid_time, state.state.is_pending())
        };

        let ctx = ApplyContext {
            tablet: tablet.as_ref(),
            op_id,
            hybrid_time,
            leader_term,
        };
        let applied = {
            let mut kind = self.kind.lock();
            let use_mvcc = kind.hooks().use_mvcc();
            kind.hooks_mut()
                .do_replicated(&ctx)
                .map(|status| (status, use_mvcc))
        };
        let (complete_status, use_mvcc) = match applied {
            Ok(applied) => {
                let mut state = self.state.lock();
                state.applying = false;
                state.state = OperationState::Replicated;
                applied
            }
            Err(e) => {
                self.state.lock().applying = false;
                warn!(
                    tablet_id = %tablet.tablet_id(),
                    %op_id,
                    error = %e,
                    "Failed to apply replicated operation"
                );
                return Err(e);
            }
        };

        if use_mvcc {
            tablet.mvcc().replicated(hybrid_time, op_id);
        }
        if was_pending {
            self.removed_from_pending(tablet.as_ref(), op_id);
        }
        self.kind.lock().hooks_mut().release();
        debug!(
            tablet_id = %tablet.tablet_id(),
            %op_id,
            %hybrid_time,
            leader_term,
            "Operation replicated"
        );

        self.complete_with_status(complete_status);
        Ok(())
    }

    /// Abandon the operation and complete it with `status`
    ///
    /// Does nothing but log if the operation is already resolved or is being
    /// applied by `replicated`.
    pub fn aborted(&self, status: Error) {
        let (op_id, hybrid_time, was_pending) = {
            let mut state = self.state.lock();
            if state.state.is_terminal() || state.applying {
                warn!(
                    operation = %self,
                    state = %state.state,
                    applying = state.applying,
                    %status,
                    "Abort ignored for a resolved or applying operation"
                );
                return;
            }
            let resolved = (state.op_id, state.hybrid_time, state.state.is_pending());
            state.state = OperationState::Aborted;
            resolved
        };

        let use_mvcc = self.kind.lock().hooks().use_mvcc();
        if (use_mvcc && hybrid_time.is_valid()) || was_pending {
            let tablet = self.tablet();
            if use_mvcc && hybrid_time.is_valid() {
                tablet.mvcc().aborted(hybrid_time, op_id);
            }
            if was_pending {
                self.removed_from_pending(tablet.as_ref(), op_id);
            }
        }

        let status = {
            let mut kind = self.kind.lock();
            kind.hooks_mut().release();
            kind.hooks().do_aborted(status)
        };
        debug!(%op_id, %status, "Operation aborted");
        self.complete_with_status(Err(status));
    }

    /// Deliver the final status to the completion callback, once
    ///
    /// A second call does not reach the callback. It is logged as an error, or
    /// panics when the tablet is configured with `fatal_on_double_completion`.
    pub fn complete_with_status(&self, status: CompletionStatus) {
        if self
            .complete
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            let fatal = self
                .tablet
                .upgrade()
                .map(|tablet| tablet.config().fatal_on_double_completion)
                .unwrap_or(false);
            error!(operation = %self, ?status, "Operation completed more than once");
            if fatal {
                panic!("operation {} completed more than once", self);
            }
            return;
        }

        let callback = self.completion_callback.lock().take();
        if let Some(callback) = callback {
            callback(status);
        }
    }

    // === Internals ===

    fn bound_round(&self) -> Result<Arc<ConsensusRound>> {
        let state = self.state.lock();
        match (&state.round, state.state) {
            (Some(round), OperationState::Bound) => Ok(Arc::clone(round)),
            _ => Err(Error::illegal_state(format!(
                "{}cannot assign while {}",
                self.log_prefix(),
                state.state
            ))),
        }
    }

    fn assign_hybrid_time(&self, state: &mut MutableState, hybrid_time: HybridTime) {
        assert!(
            !state.hybrid_time.is_valid(),
            "{}hybrid time already set to {}",
            self.log_prefix(),
            state.hybrid_time
        );
        state.hybrid_time = hybrid_time;
        self.hybrid_time_mirror
            .store(hybrid_time.to_u64(), Ordering::Release);
    }

    fn added_as_pending(&self, tablet: &dyn TabletContext, op_id: OpId, hybrid_time: HybridTime) {
        if !tablet
            .pending_operations()
            .add(op_id, self.operation_type, hybrid_time)
        {
            warn!(%op_id, "Operation was already registered as pending");
        }
        self.kind.lock().hooks_mut().added_as_pending();
    }

    fn removed_from_pending(&self, tablet: &dyn TabletContext, op_id: OpId) {
        tablet.pending_operations().remove(op_id);
        self.kind.lock().hooks_mut().removed_from_pending();
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.consensus_round() {
            Some(round) => write!(
                f,
                "{{ type: {} consensus_round: {} }}",
                self.operation_type, round
            ),
            None => write!(f, "{{ type: {} consensus_round: <unbound> }}", self.operation_type),
        }
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("operation_type", &self.operation_type)
            .field("op_id", &self.op_id())
            .field("hybrid_time", &self.hybrid_time_even_if_unset())
            .field("complete", &self.is_complete())
            .finish()
    }
}
