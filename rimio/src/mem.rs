// SPDX-License-Identifier: MIT

use crate::{RimIO, RimIOError, RimIOResult};

/// In-memory implementation of `RimIO`.
///
/// Useful for tests, fixture images and probing buffers already in RAM.
#[derive(Debug)]
pub struct MemRimIO<'a> {
    buffer: &'a mut [u8],
    partition_offset: u64,
}

impl<'a> MemRimIO<'a> {
    #[inline]
    pub fn new(buffer: &'a mut [u8]) -> Self {
        Self {
            buffer,
            partition_offset: 0,
        }
    }

    #[inline]
    pub fn new_with_offset(buffer: &'a mut [u8], partition_offset: u64) -> Self {
        Self {
            buffer,
            partition_offset,
        }
    }

    /// Total length of the backing buffer (ignores the partition offset).
    #[inline]
    pub fn len(&self) -> u64 {
        self.buffer.len() as u64
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Translates a relative range into an absolute, bounds-checked one.
    #[inline]
    fn range(&self, offset: u64, len: usize) -> RimIOResult<core::ops::Range<usize>> {
        let start = self
            .partition_offset
            .checked_add(offset)
            .ok_or(RimIOError::OutOfBounds)?;
        let end = start
            .checked_add(len as u64)
            .ok_or(RimIOError::OutOfBounds)?;
        if end > self.buffer.len() as u64 {
            return Err(RimIOError::OutOfBounds);
        }
        Ok(start as usize..end as usize)
    }
}

impl<'a> RimIO for MemRimIO<'a> {
    #[inline(always)]
    fn write_at(&mut self, offset: u64, data: &[u8]) -> RimIOResult {
        let range = self.range(offset, data.len())?;
        self.buffer[range].copy_from_slice(data);
        Ok(())
    }

    #[inline(always)]
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> RimIOResult {
        let range = self.range(offset, buf.len())?;
        buf.copy_from_slice(&self.buffer[range]);
        Ok(())
    }

    #[inline]
    fn flush(&mut self) -> RimIOResult {
        Ok(())
    }

    #[inline]
    fn set_offset(&mut self, partition_offset: u64) -> u64 {
        self.partition_offset = partition_offset;
        partition_offset
    }

    #[inline]
    fn partition_offset(&self) -> u64 {
        self.partition_offset
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::prelude::*;

    #[test]
    fn test_rw() {
        let mut buf = [0u8; 256];
        let mut io = MemRimIO::new(&mut buf);
        io.write_at(10, &[1, 2, 3, 4]).unwrap();

        let mut output = [0u8; 4];
        io.read_at(10, &mut output).unwrap();
        assert_eq!(output, [1, 2, 3, 4]);
    }

    #[test]
    fn test_short_read_is_an_error() {
        let mut buf = [0u8; 64];
        let mut io = MemRimIO::new(&mut buf);

        let mut output = [0u8; 16];
        assert_eq!(io.read_at(56, &mut output), Err(RimIOError::OutOfBounds));
        assert_eq!(io.read_at(u64::MAX, &mut output), Err(RimIOError::OutOfBounds));
    }

    #[test]
    fn test_partition_offset() {
        let mut buf = [0u8; 128];
        buf[64..68].copy_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
        let mut io = MemRimIO::new_with_offset(&mut buf, 64);

        assert_eq!(io.read_u32_be_at(0).unwrap(), 0xDEAD_BEEF);
        assert!(io.read_u32_be_at(62).is_err());

        io.set_offset(0);
        assert_eq!(io.read_u16_be_at(64).unwrap(), 0xDEAD);
    }

    #[test]
    fn test_chunked_read() {
        let mut buf = [0u8; 64];
        for (i, b) in buf.iter_mut().enumerate() {
            *b = i as u8;
        }
        let mut io = MemRimIO::new(&mut buf);

        let mut output = [0u8; 21];
        io.read_in_chunks(3, &mut output, 8).unwrap();
        assert_eq!(output[0], 3);
        assert_eq!(output[20], 23);
        assert!(io.read_in_chunks(0, &mut output, 0).is_err());
    }

    #[test]
    fn test_zero_fill() {
        let mut buf = [0xFF; 64];
        let mut io = MemRimIO::new(&mut buf);

        io.zero_fill(10, 8).unwrap();

        let mut output = [0xAA; 8];
        io.read_at(10, &mut output).unwrap();
        assert_eq!(output, [0u8; 8]);
        assert_eq!(io.read_u16_be_at(18).unwrap(), 0xFFFF);
    }

    #[test]
    fn test_be_roundtrip_u64() {
        let mut buf = [0u8; 16];
        let mut io = MemRimIO::new(&mut buf);
        io.write_u64_be_at(4, 0x0102_0304_0506_0708).unwrap();
        assert_eq!(io.read_u64_be_at(4).unwrap(), 0x0102_0304_0506_0708);
        drop(io);
        assert_eq!(buf[4], 0x01);
        assert_eq!(buf[11], 0x08);
    }
}
