//! Write-path operations for tabula
//!
//! This crate drives a replicated operation from creation to resolution:
//! - `Operation`: the state machine (bind, leader/follower assignment,
//!   replicate, abort, exactly-once completion)
//! - `OperationKind`: write, schema change, truncate and no-op hooks
//! - `MvccManager` / `PendingOperationTracker`: pending-write bookkeeping
//! - `Synchronizer`: caller-side completion wait, held weakly by the callback
//!
//! Transport, quorum logic and leader election are outside this crate; the
//! consensus layer hands in `ConsensusRound`s.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod completion;
pub mod kind;
pub mod mvcc;
pub mod operation;
pub mod pending;
pub mod permit;
pub mod round;
pub mod tablet;

pub use completion::{
    make_weak_synchronizer_completion_callback, CompletionCallback, CompletionStatus,
    Synchronizer,
};
pub use kind::{
    current_schema_version, ApplyContext, ChangeMetadataOperation, NoOpOperation,
    OperationHooks, OperationKind, TruncateOperation, WriteOperation,
};
pub use mvcc::{MvccCollaborator, MvccManager};
pub use operation::{AtomicOpId, Operation, OperationState};
pub use pending::{PendingOperation, PendingOperationTracker};
pub use permit::{PermitToken, SchemaPermits};
pub use round::{
    create_replicate_msg, ConsensusRound, OperationType, ReplicateMsg, ReplicatePayload,
    WriteBatch, WriteEntry,
};
pub use tablet::{Tablet, TabletContext};
