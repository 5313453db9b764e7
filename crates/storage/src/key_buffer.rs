//! Inline key builder.
//!
//! Most keys are short; `KeyBuffer` keeps up to `INLINE_KEY_CAPACITY` bytes on
//! the stack and spills to the heap only for longer keys.

use std::fmt;
use std::ops::Deref;

use smallvec::SmallVec;
use tabula_core::{DocHybridTime, KeyEntryType};

use crate::codec::{
    append_doc_ht_to_key, append_u16_to_key, append_u32_to_key, append_u64_to_key,
    complement_zero_encode_and_append, to_short_debug_str, zero_encode_and_append, KeyBuf,
};

/// Bytes stored inline before a key spills to the heap
pub const INLINE_KEY_CAPACITY: usize = 64;

/// Builder for one composite on-disk key
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeyBuffer {
    bytes: SmallVec<[u8; INLINE_KEY_CAPACITY]>,
}

impl KeyBuffer {
    /// Empty key
    pub fn new() -> Self {
        Self::default()
    }

    /// Key starting with an already encoded prefix
    pub fn from_prefix(prefix: &[u8]) -> Self {
        KeyBuffer {
            bytes: SmallVec::from_slice(prefix),
        }
    }

    /// Append a type tag byte
    pub fn push_entry_type(&mut self, entry_type: KeyEntryType) -> &mut Self {
        self.bytes.push(entry_type.as_byte());
        self
    }

    /// Append an ascending string field with its `String` tag
    pub fn push_string(&mut self, field: &[u8]) -> &mut Self {
        self.push_entry_type(KeyEntryType::String);
        zero_encode_and_append(field, &mut self.bytes);
        self
    }

    /// Append a descending string field with its `StringDescending` tag
    pub fn push_string_descending(&mut self, field: &[u8]) -> &mut Self {
        self.push_entry_type(KeyEntryType::StringDescending);
        complement_zero_encode_and_append(field, &mut self.bytes);
        self
    }

    /// Append a partition hash with its `UInt16Hash` tag
    pub fn push_hash(&mut self, hash: u16) -> &mut Self {
        self.push_entry_type(KeyEntryType::UInt16Hash);
        append_u16_to_key(hash, &mut self.bytes);
        self
    }

    /// Append a system column id with its `SystemColumn` tag
    pub fn push_system_column(&mut self, column: u32) -> &mut Self {
        self.push_entry_type(KeyEntryType::SystemColumn);
        append_u32_to_key(column, &mut self.bytes);
        self
    }

    /// Append a big-endian integer with its `UInt64` tag
    pub fn push_u64(&mut self, value: u64) -> &mut Self {
        self.push_entry_type(KeyEntryType::UInt64);
        append_u64_to_key(value, &mut self.bytes);
        self
    }

    /// Close the current group of key components
    pub fn push_group_end(&mut self) -> &mut Self {
        self.push_entry_type(KeyEntryType::GroupEnd)
    }

    /// Append the version suffix, tag included
    pub fn push_doc_ht(&mut self, doc_ht: &DocHybridTime) -> &mut Self {
        append_doc_ht_to_key(doc_ht, &mut self.bytes);
        self
    }

    /// Encoded bytes
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Drop everything after the first `len` bytes
    pub fn truncate(&mut self, len: usize) {
        self.bytes.truncate(len);
    }

    /// True once the key no longer fits inline
    pub fn spilled(&self) -> bool {
        self.bytes.spilled()
    }

    /// Move the bytes into a `Vec`
    pub fn into_vec(self) -> Vec<u8> {
        self.bytes.into_vec()
    }
}

impl Deref for KeyBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.bytes
    }
}

impl AsRef<[u8]> for KeyBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl KeyBuf for KeyBuffer {
    #[inline]
    fn put_slice(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }
}

impl fmt::Debug for KeyBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyBuffer({})", to_short_debug_str(&self.bytes))
    }
}
