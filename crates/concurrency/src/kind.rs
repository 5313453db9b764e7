//! Operation kinds and their lifecycle hooks
//!
//! The state machine in [`crate::operation`] is kind-agnostic. Everything that
//! differs between a write, a schema change, a truncate and a leader no-op is
//! behind [`OperationHooks`]:
//!
//! | Kind | MVCC | Bind | Apply | Abort status | Release |
//! |------|------|------|-------|--------------|---------|
//! | Write | yes | share batch with message | versioned puts | wrapped as `Aborted` | - |
//! | ChangeMetadata | no | copy schema version | system-key put | unchanged | drop permit |
//! | Truncate | no | - | clear store | unchanged | - |
//! | NoOp | no | - | - | unchanged | - |

use std::sync::Arc;

use tabula_core::{DocHybridTime, Error, HybridTime, OpId, Result};
use tabula_storage::codec::{append_u32_to_key, read_u32_from_key, to_debug_str_with_limit};
use tabula_storage::KeyBuffer;
use tracing::{debug, trace};

use crate::completion::CompletionStatus;
use crate::permit::PermitToken;
use crate::round::{OperationType, ReplicateMsg, ReplicatePayload, WriteBatch};
use crate::tablet::TabletContext;

/// System column holding the tablet's schema version
pub const SCHEMA_VERSION_COLUMN: u32 = 0;

/// What the apply hook sees of the operation being applied
pub struct ApplyContext<'a> {
    /// Owning tablet
    pub tablet: &'a dyn TabletContext,
    /// Log position of the operation
    pub op_id: OpId,
    /// Assigned hybrid time
    pub hybrid_time: HybridTime,
    /// Term of the leader that replicated the entry
    pub leader_term: i64,
}

/// Kind-specific behavior invoked by the operation state machine
pub trait OperationHooks: Send {
    /// Wire tag of this kind
    fn operation_type(&self) -> OperationType;

    /// Whether hybrid times come from, and are reported to, MVCC
    fn use_mvcc(&self) -> bool {
        false
    }

    /// Called once the operation is bound to a round
    ///
    /// The leader copies its request into the outgoing message; a follower
    /// adopts the request carried by the received one.
    fn update_request_from_consensus_round(&mut self, _msg: &mut ReplicateMsg) {}

    /// Called after the operation is registered as pending
    fn added_as_pending(&mut self) {}

    /// Called after the operation leaves the pending set
    fn removed_from_pending(&mut self) {}

    /// Apply the replicated operation to the tablet
    ///
    /// An `Err` means the operation could not be applied and must not become
    /// visible. `Ok` carries the status reported to the submitter, which may
    /// itself be an error for an operation that applied as a no-op.
    fn do_replicated(&mut self, ctx: &ApplyContext<'_>) -> Result<CompletionStatus>;

    /// Map the abort reason to the status reported to the submitter
    fn do_aborted(&self, status: Error) -> Error {
        status
    }

    /// Drop resources held until resolution
    fn release(&mut self) {}
}

// ============================================================================
// Write
// ============================================================================

/// Batch of key-value writes applied at one hybrid time
#[derive(Debug, Default)]
pub struct WriteOperation {
    batch: Option<Arc<WriteBatch>>,
}

impl WriteOperation {
    /// Leader-side write carrying `batch`
    pub fn new(batch: WriteBatch) -> Self {
        WriteOperation {
            batch: Some(Arc::new(batch)),
        }
    }

    /// Follower-side write; the batch is adopted from the replicated message
    pub fn for_follower() -> Self {
        Self::default()
    }

    /// The batch, once known
    pub fn batch(&self) -> Option<&WriteBatch> {
        self.batch.as_deref()
    }
}

impl OperationHooks for WriteOperation {
    fn operation_type(&self) -> OperationType {
        OperationType::Write
    }

    fn use_mvcc(&self) -> bool {
        true
    }

    fn update_request_from_consensus_round(&mut self, msg: &mut ReplicateMsg) {
        if let Some(batch) = &self.batch {
            msg.payload = ReplicatePayload::Write(Arc::clone(batch));
        } else if let ReplicatePayload::Write(batch) = &msg.payload {
            self.batch = Some(Arc::clone(batch));
        }
    }

    fn do_replicated(&mut self, ctx: &ApplyContext<'_>) -> Result<CompletionStatus> {
        let batch = self
            .batch
            .as_ref()
            .ok_or_else(|| Error::illegal_state("write operation carries no batch"))?;
        let config = ctx.tablet.config();
        if batch.len() > config.max_write_batch_entries {
            return Err(Error::InvalidArgument(format!(
                "write batch of {} entries exceeds limit of {}",
                batch.len(),
                config.max_write_batch_entries
            )));
        }

        let storage = ctx.tablet.storage();
        for (write_id, entry) in batch.iter().enumerate() {
            let mut key = KeyBuffer::from_prefix(&entry.key);
            key.push_doc_ht(&DocHybridTime::new(ctx.hybrid_time, write_id as u32));
            trace!(
                op_id = %ctx.op_id,
                key = %to_debug_str_with_limit(&key, config.debug_string_max_len),
                "Applying write"
            );
            storage.put(&key, &entry.value)?;
        }
        debug!(
            op_id = %ctx.op_id,
            hybrid_time = %ctx.hybrid_time,
            entries = batch.len(),
            "Applied write batch"
        );
        Ok(Ok(()))
    }

    fn do_aborted(&self, status: Error) -> Error {
        match status {
            Error::Aborted(_) => status,
            other => Error::Aborted(other.to_string()),
        }
    }
}

// ============================================================================
// ChangeMetadata
// ============================================================================

/// Schema version change, serialized by an exclusive permit
#[derive(Debug, Default)]
pub struct ChangeMetadataOperation {
    schema_version: Option<u32>,
    permit: Option<PermitToken>,
}

impl ChangeMetadataOperation {
    /// Leader-side change to `schema_version`, holding the tablet's permit
    pub fn new(schema_version: u32, permit: PermitToken) -> Self {
        ChangeMetadataOperation {
            schema_version: Some(schema_version),
            permit: Some(permit),
        }
    }

    /// Follower-side change; the version is adopted from the replicated message
    pub fn for_follower() -> Self {
        Self::default()
    }

    /// Target schema version, once known
    pub fn schema_version(&self) -> Option<u32> {
        self.schema_version
    }

    /// True while the permit is held
    pub fn holds_permit(&self) -> bool {
        self.permit.is_some()
    }

    fn schema_version_key() -> KeyBuffer {
        let mut key = KeyBuffer::new();
        key.push_system_column(SCHEMA_VERSION_COLUMN);
        key
    }
}

/// Schema version last applied to `tablet`, if any
pub fn current_schema_version(tablet: &dyn TabletContext) -> Result<Option<u32>> {
    match tablet
        .storage()
        .get(&ChangeMetadataOperation::schema_version_key())?
    {
        Some(bytes) => {
            let mut cursor = bytes.as_slice();
            Ok(Some(read_u32_from_key(&mut cursor)?))
        }
        None => Ok(None),
    }
}

impl OperationHooks for ChangeMetadataOperation {
    fn operation_type(&self) -> OperationType {
        OperationType::ChangeMetadata
    }

    fn update_request_from_consensus_round(&mut self, msg: &mut ReplicateMsg) {
        if let Some(schema_version) = self.schema_version {
            msg.payload = ReplicatePayload::ChangeMetadata { schema_version };
        } else if let ReplicatePayload::ChangeMetadata { schema_version } = msg.payload {
            self.schema_version = Some(schema_version);
        }
    }

    fn do_replicated(&mut self, ctx: &ApplyContext<'_>) -> Result<CompletionStatus> {
        let schema_version = self
            .schema_version
            .ok_or_else(|| Error::illegal_state("schema change carries no version"))?;
        if let Some(current) = current_schema_version(ctx.tablet)? {
            if schema_version <= current {
                return Ok(Err(Error::InvalidArgument(format!(
                    "schema version {} is not newer than {}",
                    schema_version, current
                ))));
            }
        }

        let mut value = Vec::with_capacity(4);
        append_u32_to_key(schema_version, &mut value);
        ctx.tablet
            .storage()
            .put(&Self::schema_version_key(), &value)?;
        debug!(op_id = %ctx.op_id, schema_version, "Applied schema change");
        Ok(Ok(()))
    }

    fn release(&mut self) {
        if self.permit.take().is_some() {
            trace!("Released permit token");
        }
    }
}

// ============================================================================
// Truncate
// ============================================================================

/// Removes every entry of the tablet
#[derive(Debug, Default)]
pub struct TruncateOperation;

impl OperationHooks for TruncateOperation {
    fn operation_type(&self) -> OperationType {
        OperationType::Truncate
    }

    fn do_replicated(&mut self, ctx: &ApplyContext<'_>) -> Result<CompletionStatus> {
        ctx.tablet.storage().truncate()?;
        debug!(op_id = %ctx.op_id, "Truncated tablet");
        Ok(Ok(()))
    }
}

// ============================================================================
// NoOp
// ============================================================================

/// Leader no-op; replicating it commits the leader's term
#[derive(Debug, Default)]
pub struct NoOpOperation;

impl OperationHooks for NoOpOperation {
    fn operation_type(&self) -> OperationType {
        OperationType::NoOp
    }

    fn do_replicated(&mut self, _ctx: &ApplyContext<'_>) -> Result<CompletionStatus> {
        Ok(Ok(()))
    }
}

// ============================================================================
// Dispatch
// ============================================================================

/// Closed set of operation kinds
#[derive(Debug)]
pub enum OperationKind {
    /// Key-value writes
    Write(WriteOperation),
    /// Schema version change
    ChangeMetadata(ChangeMetadataOperation),
    /// Truncate
    Truncate(TruncateOperation),
    /// Leader no-op
    NoOp(NoOpOperation),
}

impl OperationKind {
    /// Hooks of the wrapped kind
    pub fn hooks(&self) -> &dyn OperationHooks {
        match self {
            OperationKind::Write(op) => op,
            OperationKind::ChangeMetadata(op) => op,
            OperationKind::Truncate(op) => op,
            OperationKind::NoOp(op) => op,
        }
    }

    /// Mutable hooks of the wrapped kind
    pub fn hooks_mut(&mut self) -> &mut dyn OperationHooks {
        match self {
            OperationKind::Write(op) => op,
            OperationKind::ChangeMetadata(op) => op,
            OperationKind::Truncate(op) => op,
            OperationKind::NoOp(op) => op,
        }
    }

    /// Empty kind for an entry received as follower
    pub fn for_follower(op_type: OperationType) -> Self {
        match op_type {
            OperationType::Write => OperationKind::Write(WriteOperation::for_follower()),
            OperationType::ChangeMetadata => {
                OperationKind::ChangeMetadata(ChangeMetadataOperation::for_follower())
            }
            OperationType::Truncate => OperationKind::Truncate(TruncateOperation),
            OperationType::NoOp => OperationKind::NoOp(NoOpOperation),
        }
    }

    /// Wire tag of the wrapped kind
    pub fn operation_type(&self) -> OperationType {
        self.hooks().operation_type()
    }
}

impl From<WriteOperation> for OperationKind {
    fn from(op: WriteOperation) -> Self {
        OperationKind::Write(op)
    }
}

impl From<ChangeMetadataOperation> for OperationKind {
    fn from(op: ChangeMetadataOperation) -> Self {
        OperationKind::ChangeMetadata(op)
    }
}

impl From<TruncateOperation> for OperationKind {
    fn from(op: TruncateOperation) -> Self {
        OperationKind::Truncate(op)
    }
}

impl From<NoOpOperation> for OperationKind {
    fn from(op: NoOpOperation) -> Self {
        OperationKind::NoOp(op)
    }
}
