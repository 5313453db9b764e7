//! Escaped string fields for sortable keys.
//!
//! A variable-length field is embedded in a composite key by escaping every
//! reserved byte and closing the field with a two-byte terminator:
//!
//! ```text
//! ascending:   0x00 -> 0x00 0x01    terminator 0x00 0x00
//! descending:  0x00 -> 0xFF 0xFE, any other b -> !b           terminator 0xFF 0xFF
//! ```
//!
//! The terminator sorts below every continuation of the field, so a field that
//! is a prefix of another sorts first. The descending form is the bitwise
//! complement of the ascending one and therefore sorts in reverse.

use tabula_core::{Error, Result};

use super::KeyBuf;

/// Size of the field terminator in bytes
pub const ENCODED_KEY_STR_TERMINATOR_SIZE: usize = 2;

const ZERO: u8 = 0x00;
const ZERO_ESCAPE: u8 = 0x01;
const COMPLEMENT_ZERO: u8 = 0xFF;
const COMPLEMENT_ZERO_ESCAPE: u8 = 0xFE;

/// Append `field` to `dest`, replacing every `0x00` with `0x00 0x01`.
///
/// The appended bytes never contain `0x00 0x00`.
pub fn append_zero_encoded<B: KeyBuf + ?Sized>(field: &[u8], dest: &mut B) {
    let mut rest = field;
    while let Some(pos) = rest.iter().position(|&b| b == ZERO) {
        dest.put_slice(&rest[..pos]);
        dest.put_slice(&[ZERO, ZERO_ESCAPE]);
        rest = &rest[pos + 1..];
    }
    dest.put_slice(rest);
}

/// Append the complement of `field` to `dest`, escaping `0xFF` as `0xFF 0xFE`.
///
/// The appended bytes never contain `0xFF 0xFF`.
pub fn append_complement_zero_encoded<B: KeyBuf + ?Sized>(field: &[u8], dest: &mut B) {
    for &b in field {
        if b == ZERO {
            dest.put_slice(&[COMPLEMENT_ZERO, COMPLEMENT_ZERO_ESCAPE]);
        } else {
            dest.put_slice(&[!b]);
        }
    }
}

/// Append the ascending terminator `0x00 0x00`.
pub fn terminate_zero_encoded<B: KeyBuf + ?Sized>(dest: &mut B) {
    dest.put_slice(&[ZERO, ZERO]);
}

/// Append the descending terminator `0xFF 0xFF`.
pub fn terminate_complement_zero_encoded<B: KeyBuf + ?Sized>(dest: &mut B) {
    dest.put_slice(&[COMPLEMENT_ZERO, COMPLEMENT_ZERO]);
}

/// Escape and terminate `field` in ascending order.
#[inline]
pub fn zero_encode_and_append<B: KeyBuf + ?Sized>(field: &[u8], dest: &mut B) {
    append_zero_encoded(field, dest);
    terminate_zero_encoded(dest);
}

/// Escape and terminate `field` in descending order.
#[inline]
pub fn complement_zero_encode_and_append<B: KeyBuf + ?Sized>(field: &[u8], dest: &mut B) {
    append_complement_zero_encoded(field, dest);
    terminate_complement_zero_encoded(dest);
}

/// Escape and terminate `field` into a fresh buffer.
pub fn zero_encode(field: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(field.len() + ENCODED_KEY_STR_TERMINATOR_SIZE);
    zero_encode_and_append(field, &mut out);
    out
}

/// Decode one ascending field from the front of `input`.
///
/// Returns the decoded bytes and the number of input bytes consumed,
/// terminator included.
///
/// # Errors
///
/// `MalformedEncoding` if the terminator is missing, an escape is cut short,
/// or an escape byte other than `0x01` follows `0x00`.
pub fn decode_zero_encoded(input: &[u8]) -> Result<(Vec<u8>, usize)> {
    decode_escaped(input, ZERO, ZERO_ESCAPE, |b| b)
}

/// Decode one descending field from the front of `input`.
///
/// Counterpart of [`complement_zero_encode_and_append`].
pub fn decode_complement_zero_encoded(input: &[u8]) -> Result<(Vec<u8>, usize)> {
    decode_escaped(input, COMPLEMENT_ZERO, COMPLEMENT_ZERO_ESCAPE, |b| !b)
}

/// Decode one ascending field and advance `cursor` past it.
///
/// On error the cursor is left untouched.
pub fn decode_zero_encoded_from(cursor: &mut &[u8]) -> Result<Vec<u8>> {
    let (value, consumed) = decode_zero_encoded(cursor)?;
    *cursor = &cursor[consumed..];
    Ok(value)
}

/// Decode one descending field and advance `cursor` past it.
pub fn decode_complement_zero_encoded_from(cursor: &mut &[u8]) -> Result<Vec<u8>> {
    let (value, consumed) = decode_complement_zero_encoded(cursor)?;
    *cursor = &cursor[consumed..];
    Ok(value)
}

/// Decode an input that holds exactly one ascending field.
///
/// # Errors
///
/// As [`decode_zero_encoded`], plus `MalformedEncoding` when bytes remain
/// after the terminator.
pub fn decode_zero_encoded_exact(input: &[u8]) -> Result<Vec<u8>> {
    let (value, consumed) = decode_zero_encoded(input)?;
    if consumed != input.len() {
        return Err(Error::malformed(format!(
            "{} trailing bytes after zero-encoded field",
            input.len() - consumed
        )));
    }
    Ok(value)
}

fn decode_escaped(
    input: &[u8],
    reserved: u8,
    escape: u8,
    map: impl Fn(u8) -> u8,
) -> Result<(Vec<u8>, usize)> {
    let mut out = Vec::with_capacity(input.len());
    let mut pos = 0;
    loop {
        let rest = &input[pos..];
        let Some(offset) = rest.iter().position(|&b| b == reserved) else {
            return Err(Error::malformed(format!(
                "no terminator found in {} bytes",
                input.len()
            )));
        };
        out.extend(rest[..offset].iter().map(|&b| map(b)));
        pos += offset;

        match input.get(pos + 1) {
            None => {
                return Err(Error::malformed(format!(
                    "reserved byte {:#04x} at end of input without escape or terminator",
                    reserved
                )))
            }
            Some(&next) if next == reserved => return Ok((out, pos + 2)),
            Some(&next) if next == escape => {
                out.push(map(reserved));
                pos += 2;
            }
            Some(&next) => {
                return Err(Error::malformed(format!(
                    "invalid escape {:#04x} {:#04x} at offset {}",
                    reserved, next, pos
                )))
            }
        }
    }
}
