//! Self-describing version suffix (encoded DocHybridTime).
//!
//! Every on-disk key ends with `[KeyEntryType::HybridTime][encoded DocHybridTime]`.
//! The suffix layout is:
//!
//! ```text
//! [ht varint][write_id varint][trailer]
//!
//! varint(v) = [n][v as n big-endian bytes, no leading zero byte]    n in 0..=8
//! trailer   = (total_len - 1) in the low 5 bits, high bits zero
//! ```
//!
//! Varints are prefix-free and order-preserving, so plain byte comparison of
//! two suffixes is the tuple comparison of `(hybrid_time, write_id)`, newest
//! last. The trailer lets a reader find the start of the suffix by looking
//! only at the final byte of a key.
//!
//! Readers that iterate newest-first keep the suffix bitwise inverted; the
//! inverted trailer still carries the size once complemented back.

use tabula_core::{DocHybridTime, Error, HybridTime, KeyEntryType, Result};

use super::debug::to_short_debug_str;
use super::KeyBuf;

/// Number of trailer bits holding `size - 1`
pub const NUM_BITS_FOR_ENCODED_SIZE: u32 = 5;

const SIZE_MASK: u8 = (1 << NUM_BITS_FOR_ENCODED_SIZE) - 1;

/// Smallest encoded suffix: two empty varints plus the trailer
pub const MIN_BYTES_PER_ENCODED_DOC_HT: usize = 3;

/// Largest encoded suffix: 9-byte hybrid time, 5-byte write id, trailer
pub const MAX_BYTES_PER_ENCODED_DOC_HT: usize = 15;

/// Scratch storage for inverting a suffix without allocating
pub type DocHybridTimeBuffer = [u8; MAX_BYTES_PER_ENCODED_DOC_HT];

/// An encoded suffix held inline
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct EncodedDocHybridTime {
    buf: DocHybridTimeBuffer,
    len: u8,
}

impl EncodedDocHybridTime {
    /// Encoded bytes
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.len as usize]
    }

    /// Encoded length in bytes
    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// Always false; an encoded suffix has at least three bytes
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl AsRef<[u8]> for EncodedDocHybridTime {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl std::fmt::Debug for EncodedDocHybridTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EncodedDocHybridTime({})", to_short_debug_str(self.as_slice()))
    }
}

fn put_varint(buf: &mut DocHybridTimeBuffer, pos: &mut usize, value: u64) {
    let n = 8 - (value.leading_zeros() / 8) as usize;
    buf[*pos] = n as u8;
    *pos += 1;
    buf[*pos..*pos + n].copy_from_slice(&value.to_be_bytes()[8 - n..]);
    *pos += n;
}

fn get_varint(cursor: &mut &[u8], max_bytes: usize, what: &str) -> Result<u64> {
    let Some((&n, rest)) = cursor.split_first() else {
        return Err(Error::corruption(format!("missing {} length byte", what)));
    };
    let n = n as usize;
    if n > max_bytes {
        return Err(Error::corruption(format!(
            "{} length {} exceeds {} bytes",
            what, n, max_bytes
        )));
    }
    if rest.len() < n {
        return Err(Error::corruption(format!(
            "{} needs {} bytes, have {}",
            what,
            n,
            rest.len()
        )));
    }
    if n > 0 && rest[0] == 0 {
        return Err(Error::corruption(format!("non-canonical {} encoding", what)));
    }
    let value = rest[..n].iter().fold(0u64, |acc, &b| (acc << 8) | b as u64);
    *cursor = &rest[n..];
    Ok(value)
}

/// Encode a version suffix.
pub fn encode_doc_ht(doc_ht: &DocHybridTime) -> EncodedDocHybridTime {
    let mut buf = [0u8; MAX_BYTES_PER_ENCODED_DOC_HT];
    let mut pos = 0;
    put_varint(&mut buf, &mut pos, doc_ht.hybrid_time().to_u64());
    put_varint(&mut buf, &mut pos, doc_ht.write_id() as u64);
    buf[pos] = (pos as u8) & SIZE_MASK;
    pos += 1;
    EncodedDocHybridTime {
        buf,
        len: pos as u8,
    }
}

/// Append `[KeyEntryType::HybridTime][suffix]` to a key.
pub fn append_doc_ht_to_key<B: KeyBuf + ?Sized>(doc_ht: &DocHybridTime, dest: &mut B) {
    dest.put_slice(&[KeyEntryType::HybridTime.as_byte()]);
    dest.put_slice(encode_doc_ht(doc_ht).as_slice());
}

/// Decode a suffix that spans all of `encoded`.
///
/// # Errors
///
/// `Corruption` if the trailer disagrees with the input length or a varint
/// is truncated, oversized, or non-canonical.
pub fn decode_doc_ht(encoded: &[u8]) -> Result<DocHybridTime> {
    let Some(&trailer) = encoded.last() else {
        return Err(Error::corruption("empty encoded DocHybridTime"));
    };
    let size = (trailer & SIZE_MASK) as usize + 1;
    if size != encoded.len() || trailer & !SIZE_MASK != 0 {
        return Err(Error::corruption(format!(
            "encoded DocHybridTime trailer {:#04x} does not match length {}: {}",
            trailer,
            encoded.len(),
            to_short_debug_str(encoded)
        )));
    }

    let mut cursor = &encoded[..encoded.len() - 1];
    let ht = get_varint(&mut cursor, 8, "hybrid time")?;
    let write_id = get_varint(&mut cursor, 4, "write id")?;
    if !cursor.is_empty() {
        return Err(Error::corruption(format!(
            "{} unexpected bytes in encoded DocHybridTime",
            cursor.len()
        )));
    }
    Ok(DocHybridTime::new(HybridTime::from_u64(ht), write_id as u32))
}

fn check_size_and_tag(key: &[u8], size: usize) -> Result<usize> {
    if !(MIN_BYTES_PER_ENCODED_DOC_HT..=MAX_BYTES_PER_ENCODED_DOC_HT).contains(&size) {
        return Err(Error::corruption(format!(
            "Encoded DocHybridTime size {} out of bounds: expected between {} and {}, key: {}",
            size,
            MIN_BYTES_PER_ENCODED_DOC_HT,
            MAX_BYTES_PER_ENCODED_DOC_HT,
            to_short_debug_str(key)
        )));
    }
    if key.len() < size + 1 {
        return Err(Error::corruption(format!(
            "Encoded DocHybridTime size {} out of bounds: key has only {} bytes: {}",
            size,
            key.len(),
            to_short_debug_str(key)
        )));
    }
    let tag = key[key.len() - size - 1];
    if tag != KeyEntryType::HybridTime.as_byte() {
        return Err(Error::corruption(format!(
            "Wrong value type before encoded DocHybridTime: expected {:#04x}, found {:#04x}, key: {}",
            KeyEntryType::HybridTime.as_byte(),
            tag,
            to_short_debug_str(key)
        )));
    }
    Ok(size)
}

/// Validate the suffix of a full on-disk key and return its size in bytes.
///
/// Checks that the size stored in the final byte is within bounds and that
/// the byte preceding the suffix is `KeyEntryType::HybridTime`.
pub fn check_hybrid_time_size_and_value_type(key: &[u8]) -> Result<usize> {
    let Some(&last) = key.last() else {
        return Err(Error::corruption(
            "Encoded DocHybridTime size out of bounds: empty key",
        ));
    };
    check_size_and_tag(key, (last & SIZE_MASK) as usize + 1)
}

/// Decode the version suffix at the end of a full on-disk key.
pub fn decode_doc_ht_from_end(key: &[u8]) -> Result<DocHybridTime> {
    let size = check_hybrid_time_size_and_value_type(key)?;
    decode_doc_ht(&key[key.len() - size..])
}

/// Write the bitwise complement of `suffix` into `buffer`.
///
/// Returns the inverted bytes as a view into `buffer`. Inverting twice
/// restores the original bytes, and inversion reverses byte order between
/// suffixes.
///
/// # Errors
///
/// `Corruption` if `suffix` is longer than any valid encoding.
pub fn invert_encoded_doc_ht<'a>(
    suffix: &[u8],
    buffer: &'a mut DocHybridTimeBuffer,
) -> Result<&'a [u8]> {
    if suffix.len() > buffer.len() {
        return Err(Error::corruption(format!(
            "Encoded DocHybridTime too long to invert: {} bytes",
            suffix.len()
        )));
    }
    for (dst, src) in buffer.iter_mut().zip(suffix) {
        *dst = !src;
    }
    Ok(&buffer[..suffix.len()])
}

/// Decode a key that ends in `[KeyEntryType::HybridTime][inverted suffix]`.
pub fn decode_inverted_doc_ht(key: &[u8]) -> Result<DocHybridTime> {
    let Some(&last) = key.last() else {
        return Err(Error::corruption(
            "Encoded DocHybridTime size out of bounds: empty key",
        ));
    };
    let size = check_size_and_tag(key, (!last & SIZE_MASK) as usize + 1)?;
    let mut buffer = [0u8; MAX_BYTES_PER_ENCODED_DOC_HT];
    let restored = invert_encoded_doc_ht(&key[key.len() - size..], &mut buffer)?;
    decode_doc_ht(restored)
}
