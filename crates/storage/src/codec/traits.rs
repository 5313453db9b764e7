//! Output buffer abstraction for the key codecs.

use smallvec::{Array, SmallVec};

/// Byte sink the key encoders append to.
///
/// Implemented for `Vec<u8>` and for inline `SmallVec` buffers so that the
/// same encoder serves heap-backed keys and stack-resident key prefixes.
pub trait KeyBuf {
    /// Append `bytes` at the end of the buffer.
    fn put_slice(&mut self, bytes: &[u8]);
}

impl KeyBuf for Vec<u8> {
    #[inline]
    fn put_slice(&mut self, bytes: &[u8]) {
        self.extend_from_slice(bytes);
    }
}

impl<A: Array<Item = u8>> KeyBuf for SmallVec<A> {
    #[inline]
    fn put_slice(&mut self, bytes: &[u8]) {
        self.extend_from_slice(bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill<B: KeyBuf + ?Sized>(dest: &mut B) {
        dest.put_slice(b"ab");
        dest.put_slice(b"");
        dest.put_slice(b"c");
    }

    #[test]
    fn test_vec_sink() {
        let mut out = Vec::new();
        fill(&mut out);
        assert_eq!(out, b"abc");
    }

    #[test]
    fn test_smallvec_sink_spills() {
        let mut out: SmallVec<[u8; 2]> = SmallVec::new();
        fill(&mut out);
        assert_eq!(out.as_slice(), b"abc");
        assert!(out.spilled());
    }
}
