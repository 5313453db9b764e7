//! Storage-facing codecs for tabula
//!
//! This crate implements the on-disk key format:
//! - Zero / complement-zero encoded string fields (ascending and descending)
//! - Big-endian fixed-width integers
//! - The self-describing DocHybridTime version suffix, its validation and its
//!   inverted form for newest-first iteration
//! - KeyBuffer: inline composite key builder
//! - RawKvStore: the sorted byte-range storage seam, with MemKvStore
//!
//! # On-disk key layout
//!
//! ```text
//! [tag][escaped field][00 00] ... ['#'][3..=15 suffix bytes, last & 0x1F = len - 1]
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod key_buffer;
pub mod store;

pub use key_buffer::KeyBuffer;
pub use store::{MemKvStore, RawKvStore};
