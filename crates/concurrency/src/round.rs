//! Consensus round and outgoing replicate message
//!
//! A `ConsensusRound` is one entry proposed to (leader) or received from
//! (follower) the replicated log. Only its id and its replicate message are
//! consumed here; transport and quorum logic live elsewhere.
//!
//! The replicate message is allocated once, boxed, by [`create_replicate_msg`]
//! and owned by the round from then on. Every field is fixed-size or shared
//! (`Arc`), so stamping it on the leader path never allocates.

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use tabula_core::{HybridTime, OpId};

/// Wire tag of an operation kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OperationType {
    /// Batch of key-value writes
    Write = 1,
    /// Schema version change
    ChangeMetadata = 2,
    /// Remove every entry of the tablet
    Truncate = 3,
    /// Leader no-op, appended at the start of a term
    NoOp = 4,
}

impl OperationType {
    /// Convert to byte representation
    pub fn as_byte(&self) -> u8 {
        *self as u8
    }

    /// Try to create from byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(OperationType::Write),
            2 => Some(OperationType::ChangeMetadata),
            3 => Some(OperationType::Truncate),
            4 => Some(OperationType::NoOp),
            _ => None,
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationType::Write => "WRITE",
            OperationType::ChangeMetadata => "CHANGE_METADATA",
            OperationType::Truncate => "TRUNCATE",
            OperationType::NoOp => "NO_OP",
        };
        f.write_str(name)
    }
}

/// One entry of a write batch
///
/// `key` is the encoded document key without its version suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteEntry {
    /// Encoded key prefix
    pub key: Vec<u8>,
    /// Raw value
    pub value: Vec<u8>,
}

impl WriteEntry {
    /// Create an entry
    pub fn new(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        WriteEntry {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Ordered set of writes applied at a single hybrid time
pub type WriteBatch = Vec<WriteEntry>;

/// Operation-specific body of a replicate message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ReplicatePayload {
    /// Not filled in yet
    #[default]
    Empty,
    /// Write batch, shared with the operation
    Write(Arc<WriteBatch>),
    /// Target schema version
    ChangeMetadata {
        /// Version the tablet moves to
        schema_version: u32,
    },
}

/// Message replicated through consensus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicateMsg {
    /// Kind of operation carried
    pub op_type: OperationType,
    /// Log position, stamped by the leader
    pub id: OpId,
    /// Committed position known to the leader when the entry was appended
    pub committed_op_id: OpId,
    /// Serialization timestamp, stamped by the leader
    pub hybrid_time: Option<HybridTime>,
    /// Owner's monotonic counter at leader assignment
    pub monotonic_counter: i64,
    /// Operation-specific body
    pub payload: ReplicatePayload,
}

/// Allocate the replicate message for a new leader-side operation
pub fn create_replicate_msg(op_type: OperationType) -> Box<ReplicateMsg> {
    Box::new(ReplicateMsg {
        op_type,
        id: OpId::INVALID,
        committed_op_id: OpId::INVALID,
        hybrid_time: None,
        monotonic_counter: 0,
        payload: ReplicatePayload::Empty,
    })
}

/// One entry of the replicated log
pub struct ConsensusRound {
    id: OpId,
    committed_op_id: OpId,
    replicate_msg: Mutex<Box<ReplicateMsg>>,
}

impl ConsensusRound {
    /// Leader-side round for a freshly appended entry
    pub fn new(id: OpId, committed_op_id: OpId, replicate_msg: Box<ReplicateMsg>) -> Self {
        ConsensusRound {
            id,
            committed_op_id,
            replicate_msg: Mutex::new(replicate_msg),
        }
    }

    /// Follower-side round for an entry received from the leader
    ///
    /// The id and committed id are taken from the message itself.
    pub fn from_replicate_msg(replicate_msg: Box<ReplicateMsg>) -> Self {
        ConsensusRound {
            id: replicate_msg.id,
            committed_op_id: replicate_msg.committed_op_id,
            replicate_msg: Mutex::new(replicate_msg),
        }
    }

    /// Position of the entry in the log
    pub fn id(&self) -> OpId {
        self.id
    }

    /// Committed position at append time
    pub fn committed_op_id(&self) -> OpId {
        self.committed_op_id
    }

    /// Exclusive access to the replicate message
    pub fn replicate_msg(&self) -> MutexGuard<'_, Box<ReplicateMsg>> {
        self.replicate_msg.lock()
    }

    /// Copy of the message, e.g. to hand to a follower
    pub fn snapshot_replicate_msg(&self) -> Box<ReplicateMsg> {
        self.replicate_msg.lock().clone()
    }
}

impl fmt::Debug for ConsensusRound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsensusRound")
            .field("id", &self.id)
            .field("committed_op_id", &self.committed_op_id)
            .finish()
    }
}

impl fmt::Display for ConsensusRound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_type_bytes() {
        for op_type in [
            OperationType::Write,
            OperationType::ChangeMetadata,
            OperationType::Truncate,
            OperationType::NoOp,
        ] {
            assert_eq!(OperationType::from_byte(op_type.as_byte()), Some(op_type));
        }
        assert_eq!(OperationType::from_byte(0), None);
    }

    #[test]
    fn test_create_replicate_msg_is_blank() {
        let msg = create_replicate_msg(OperationType::Write);
        assert_eq!(msg.op_type, OperationType::Write);
        assert_eq!(msg.id, OpId::INVALID);
        assert_eq!(msg.hybrid_time, None);
        assert_eq!(msg.payload, ReplicatePayload::Empty);
    }

    #[test]
    fn test_leader_round_exposes_id() {
        let round = ConsensusRound::new(
            OpId::new(1, 5),
            OpId::new(1, 4),
            create_replicate_msg(OperationType::NoOp),
        );
        assert_eq!(round.id(), OpId::new(1, 5));
        assert_eq!(round.committed_op_id(), OpId::new(1, 4));
        assert_eq!(round.to_string(), "1.5");
    }

    #[test]
    fn test_follower_round_takes_id_from_message() {
        let mut msg = create_replicate_msg(OperationType::Write);
        msg.id = OpId::new(2, 9);
        msg.committed_op_id = OpId::new(2, 7);
        msg.hybrid_time = Some(HybridTime::from_micros(10));
        let round = ConsensusRound::from_replicate_msg(msg);
        assert_eq!(round.id(), OpId::new(2, 9));
        assert_eq!(round.committed_op_id(), OpId::new(2, 7));
        assert_eq!(
            round.replicate_msg().hybrid_time,
            Some(HybridTime::from_micros(10))
        );
    }

    #[test]
    fn test_message_is_mutable_through_round() {
        let round = ConsensusRound::new(
            OpId::new(1, 1),
            OpId::INVALID,
            create_replicate_msg(OperationType::ChangeMetadata),
        );
        round.replicate_msg().payload = ReplicatePayload::ChangeMetadata { schema_version: 3 };
        let snapshot = round.snapshot_replicate_msg();
        assert_eq!(
            snapshot.payload,
            ReplicatePayload::ChangeMetadata { schema_version: 3 }
        );
    }
}
