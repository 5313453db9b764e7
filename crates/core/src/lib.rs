//! Core types for tabula
//!
//! This crate defines the foundational types used by the write path:
//! - HybridTime / DocHybridTime: serialization timestamps and key versions
//! - OpId: position of an entry in the replicated log
//! - TabletId: identity of the owning tablet
//! - KeyEntryType: one-byte type tags embedded in on-disk keys
//! - Clock: hybrid clock sources
//! - TabletConfig: write-path configuration
//! - Error: error type shared by codecs and operations

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod clock;
pub mod config;
pub mod error;
pub mod hybrid_time;
pub mod types;

pub use clock::{Clock, HybridClock, LogicalClock};
pub use config::{TabletConfig, TabletConfigError};
pub use error::{Error, Result};
pub use hybrid_time::{DocHybridTime, HybridTime};
pub use types::{KeyEntryType, OpId, TabletId};
