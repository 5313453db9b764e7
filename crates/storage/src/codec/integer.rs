//! Fixed-width big-endian integers in keys.
//!
//! Byte-wise comparison of big-endian integers matches numeric comparison,
//! which is why keys never carry little-endian fields.

use byteorder::{BigEndian, ByteOrder};
use tabula_core::{Error, Result};

use super::KeyBuf;

/// Append `value` as two big-endian bytes.
pub fn append_u16_to_key<B: KeyBuf + ?Sized>(value: u16, dest: &mut B) {
    let mut buf = [0u8; 2];
    BigEndian::write_u16(&mut buf, value);
    dest.put_slice(&buf);
}

/// Append `value` as four big-endian bytes.
pub fn append_u32_to_key<B: KeyBuf + ?Sized>(value: u32, dest: &mut B) {
    let mut buf = [0u8; 4];
    BigEndian::write_u32(&mut buf, value);
    dest.put_slice(&buf);
}

/// Append `value` as eight big-endian bytes.
pub fn append_u64_to_key<B: KeyBuf + ?Sized>(value: u64, dest: &mut B) {
    let mut buf = [0u8; 8];
    BigEndian::write_u64(&mut buf, value);
    dest.put_slice(&buf);
}

fn take<'a>(cursor: &mut &'a [u8], n: usize, what: &str) -> Result<&'a [u8]> {
    if cursor.len() < n {
        return Err(Error::malformed(format!(
            "need {} bytes for {}, have {}",
            n,
            what,
            cursor.len()
        )));
    }
    let (head, tail) = cursor.split_at(n);
    *cursor = tail;
    Ok(head)
}

/// Read a big-endian `u16` and advance `cursor`.
pub fn read_u16_from_key(cursor: &mut &[u8]) -> Result<u16> {
    take(cursor, 2, "u16").map(BigEndian::read_u16)
}

/// Read a big-endian `u32` and advance `cursor`.
pub fn read_u32_from_key(cursor: &mut &[u8]) -> Result<u32> {
    take(cursor, 4, "u32").map(BigEndian::read_u32)
}

/// Read a big-endian `u64` and advance `cursor`.
pub fn read_u64_from_key(cursor: &mut &[u8]) -> Result<u64> {
    take(cursor, 8, "u64").map(BigEndian::read_u64)
}
