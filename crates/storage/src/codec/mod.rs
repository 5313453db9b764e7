//! Key codecs.
//!
//! Pure functions that build and parse on-disk keys. They hold no state and
//! write only into caller-owned buffers, so any number of threads may use
//! them concurrently.
//!
//! - `zero_encoding`: escaped, terminated variable-length fields (ascending
//!   and descending)
//! - `integer`: fixed-width big-endian integers
//! - `doc_ht`: the self-describing version suffix and its inverted form
//! - `debug`: short human-readable rendering of raw keys
//!
//! # Usage
//!
//! ```
//! use tabula_core::{DocHybridTime, HybridTime};
//! use tabula_storage::codec::{
//!     append_doc_ht_to_key, append_u32_to_key, decode_doc_ht_from_end, zero_encode_and_append,
//! };
//!
//! let mut key = Vec::new();
//! zero_encode_and_append(b"users", &mut key);
//! append_u32_to_key(42, &mut key);
//! let version = DocHybridTime::new(HybridTime::from_micros(1_000), 0);
//! append_doc_ht_to_key(&version, &mut key);
//!
//! assert_eq!(decode_doc_ht_from_end(&key).unwrap(), version);
//! ```

pub mod debug;
pub mod doc_ht;
pub mod integer;
mod traits;
pub mod zero_encoding;

pub use debug::{to_debug_str_with_limit, to_short_debug_str, SHORT_DEBUG_STRING_LENGTH};
pub use doc_ht::{
    append_doc_ht_to_key, check_hybrid_time_size_and_value_type, decode_doc_ht,
    decode_doc_ht_from_end, decode_inverted_doc_ht, encode_doc_ht, invert_encoded_doc_ht,
    DocHybridTimeBuffer, EncodedDocHybridTime, MAX_BYTES_PER_ENCODED_DOC_HT,
    MIN_BYTES_PER_ENCODED_DOC_HT,
};
pub use integer::{
    append_u16_to_key, append_u32_to_key, append_u64_to_key, read_u16_from_key,
    read_u32_from_key, read_u64_from_key,
};
pub use traits::KeyBuf;
pub use zero_encoding::{
    append_complement_zero_encoded, append_zero_encoded, complement_zero_encode_and_append,
    decode_complement_zero_encoded, decode_complement_zero_encoded_from, decode_zero_encoded,
    decode_zero_encoded_exact, decode_zero_encoded_from, terminate_complement_zero_encoded,
    terminate_zero_encoded, zero_encode, zero_encode_and_append,
    ENCODED_KEY_STR_TERMINATOR_SIZE,
};
