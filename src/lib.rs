//! Tabula - write-path substrate for a replicated multi-version key-value store
//!
//! Tabula turns a batch of logical writes into versioned, byte-sortable keys and
//! drives each write through replication with exactly-once completion.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use tabula::concurrency::{
//!     create_replicate_msg, make_weak_synchronizer_completion_callback, ConsensusRound,
//!     Operation, OperationType, Synchronizer, Tablet, WriteEntry, WriteOperation,
//! };
//!
//! let op = Operation::new(WriteOperation::new(vec![WriteEntry::new("k", "v")]), &tablet);
//! let sync = Arc::new(Synchronizer::new());
//! op.set_completion_callback(make_weak_synchronizer_completion_callback(Arc::downgrade(&sync)));
//!
//! op.set_consensus_round(round)?;
//! op.added_to_leader()?;
//! op.replicated(term)?;
//! sync.wait()?;
//! ```
//!
//! # Architecture
//!
//! - [`common`]: hybrid time, ids, errors, configuration
//! - [`storage`]: key codecs, version suffix, raw storage seam
//! - [`concurrency`]: operation state machine and its collaborators

pub use tabula_concurrency as concurrency;
pub use tabula_core as common;
pub use tabula_storage as storage;

pub use tabula_core::{DocHybridTime, Error, HybridTime, OpId, Result, TabletConfig};
