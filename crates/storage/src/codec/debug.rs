//! Debug rendering of raw key bytes.

use std::fmt::Write;

/// Number of input bytes rendered by [`to_short_debug_str`]
pub const SHORT_DEBUG_STRING_LENGTH: usize = 40;

/// Render `bytes` for log messages, capped at [`SHORT_DEBUG_STRING_LENGTH`].
pub fn to_short_debug_str(bytes: &[u8]) -> String {
    to_debug_str_with_limit(bytes, SHORT_DEBUG_STRING_LENGTH)
}

/// Render at most `limit` bytes of `bytes` as a double-quoted string.
///
/// Printable ASCII is kept as is (with `"` and `\` escaped); everything else
/// becomes `\xNN`. A trailing `...` marks truncation.
pub fn to_debug_str_with_limit(bytes: &[u8], limit: usize) -> String {
    let shown = &bytes[..bytes.len().min(limit)];
    let mut out = String::with_capacity(shown.len() + 5);
    out.push('"');
    for &b in shown {
        match b {
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            0x20..=0x7e => out.push(b as char),
            _ => {
                let _ = write!(out, "\\x{:02x}", b);
            }
        }
    }
    out.push('"');
    if shown.len() < bytes.len() {
        out.push_str("...");
    }
    out
}
