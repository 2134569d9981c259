//! Big-endian byte cursor used by the payload decoders.

use crate::error::{RefcodecError, RefcodecResult};

/// Reads big-endian fields from a payload, failing on truncation.
#[derive(Debug)]
pub(crate) struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub(crate) const fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    pub(crate) fn take(&mut self, len: usize) -> RefcodecResult<&'a [u8]> {
        if len > self.remaining() {
            return Err(RefcodecError::Truncated {
                needed: len,
                available: self.remaining(),
            });
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> RefcodecResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub(crate) fn read_u8(&mut self) -> RefcodecResult<u8> {
        Ok(self.array::<1>()?[0])
    }

    pub(crate) fn read_u32(&mut self) -> RefcodecResult<u32> {
        self.array().map(u32::from_be_bytes)
    }

    pub(crate) fn read_u64(&mut self) -> RefcodecResult<u64> {
        self.array().map(u64::from_be_bytes)
    }

    pub(crate) fn read_i16(&mut self) -> RefcodecResult<i16> {
        self.array().map(i16::from_be_bytes)
    }

    pub(crate) fn read_f32(&mut self) -> RefcodecResult<f32> {
        self.array().map(f32::from_be_bytes)
    }

    /// Fails if any byte is left unread.
    pub(crate) const fn finish(&self) -> RefcodecResult<()> {
        if self.remaining() > 0 {
            return Err(RefcodecError::TrailingData {
                remaining: self.remaining(),
            });
        }
        Ok(())
    }
}
