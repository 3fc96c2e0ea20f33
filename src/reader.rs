//! Bounds-checked cursor over an untrusted buffer.
//!
//! Every length-prefixed read is checked against the remaining bytes before
//! anything is sliced, so a forged length can never over-read.

use crate::error::{EnvelopeError, Result};
use crate::varint;

pub(crate) struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub(crate) fn bytes(&mut self, n: usize, what: &'static str) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(EnvelopeError::MalformedPacket(what));
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub(crate) fn array<const N: usize>(&mut self, what: &'static str) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(N, what)?);
        Ok(out)
    }

    pub(crate) fn u8(&mut self, what: &'static str) -> Result<u8> {
        Ok(self.array::<1>(what)?[0])
    }

    pub(crate) fn u16_be(&mut self, what: &'static str) -> Result<u16> {
        Ok(u16::from_be_bytes(self.array(what)?))
    }

    pub(crate) fn u32_be(&mut self, what: &'static str) -> Result<u32> {
        Ok(u32::from_be_bytes(self.array(what)?))
    }

    pub(crate) fn varint(&mut self) -> Result<u64> {
        varint::decode_varint(self.buf, &mut self.pos)
    }

    /// Read a varint length, then that many bytes.
    pub(crate) fn varint_prefixed(&mut self, what: &'static str) -> Result<&'a [u8]> {
        let len = self.varint()?;
        let len = usize::try_from(len).map_err(|_| EnvelopeError::MalformedPacket(what))?;
        self.bytes(len, what)
    }

    /// Everything left in the buffer.
    pub(crate) fn rest(&mut self) -> &'a [u8] {
        let out = &self.buf[self.pos..];
        self.pos = self.buf.len();
        out
    }

    pub(crate) fn finish(&self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(EnvelopeError::MalformedPacket("trailing bytes after packet"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_reads_fail() {
        let mut r = Reader::new(&[0x00, 0x01]);
        assert!(r.u32_be("len").is_err());
        assert_eq!(r.u16_be("len").unwrap(), 1);
        assert!(r.u8("tag").is_err());
        r.finish().unwrap();
    }

    #[test]
    fn forged_length_does_not_over_read() {
        let mut r = Reader::new(&[0xFF, 0xFF, 0x03, b'a']);
        assert_eq!(
            r.varint_prefixed("aad"),
            Err(EnvelopeError::MalformedPacket("aad"))
        );
    }

    #[test]
    fn rest_consumes_everything() {
        let mut r = Reader::new(b"abc");
        r.u8("x").unwrap();
        assert_eq!(r.rest(), b"bc");
        assert!(r.is_empty());
        assert_eq!(r.rest(), b"");
    }
}
