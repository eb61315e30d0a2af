// SPDX-License-Identifier: MIT

use std::io::{Error, ErrorKind, Read, Seek, SeekFrom, Write};

use crate::{RimIO, RimIOError, RimIOResult};

/// `RimIO` over any seekable std stream (image files, block device nodes).
#[derive(Debug)]
pub struct StdRimIO<'a, T: Read + Write + Seek> {
    io: &'a mut T,
    partition_offset: u64,
}

impl<'a, T: Read + Write + Seek> StdRimIO<'a, T> {
    #[inline]
    pub fn new(io: &'a mut T) -> Self {
        Self {
            io,
            partition_offset: 0,
        }
    }

    #[inline]
    pub fn new_with_offset(io: &'a mut T, partition_offset: u64) -> Self {
        Self {
            io,
            partition_offset,
        }
    }

    /// Size of the underlying stream in bytes (seeks to the end and back).
    pub fn stream_len(&mut self) -> RimIOResult<u64> {
        let pos = self.io.stream_position()?;
        let len = self.io.seek(SeekFrom::End(0))?;
        self.io.seek(SeekFrom::Start(pos))?;
        Ok(len)
    }

    #[inline]
    fn abs_offset(&self, offset: u64) -> RimIOResult<u64> {
        self.partition_offset
            .checked_add(offset)
            .ok_or(RimIOError::OutOfBounds)
    }
}

impl<'a, T: Read + Write + Seek> RimIO for StdRimIO<'a, T> {
    fn write_at(&mut self, offset: u64, data: &[u8]) -> RimIOResult {
        let abs_offset = self.abs_offset(offset)?;
        self.io.seek(SeekFrom::Start(abs_offset))?;
        self.io.write_all(data)?;
        Ok(())
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> RimIOResult {
        let abs_offset = self.abs_offset(offset)?;
        self.io.seek(SeekFrom::Start(abs_offset))?;
        self.io.read_exact(buf)?;
        Ok(())
    }

    fn flush(&mut self) -> RimIOResult {
        self.io.flush()?;
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

impl From<Error> for RimIOError {
    #[cold]
    #[inline(never)]
    fn from(e: Error) -> Self {
        match e.kind() {
            ErrorKind::UnexpectedEof => RimIOError::OutOfBounds,
            ErrorKind::PermissionDenied => RimIOError::Io("permission denied"),
            ErrorKind::InvalidInput => RimIOError::Invalid("invalid seek or IO argument"),
            ErrorKind::Unsupported => RimIOError::Unsupported,
            ErrorKind::WriteZero => RimIOError::Io("short write"),
            _ => RimIOError::Io("IO error"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::prelude::*;
    use tempfile::tempfile;

    #[test]
    fn test_rw() {
        let mut file = tempfile().unwrap();
        let mut io = StdRimIO::new(&mut file);
        io.write_at(10, &[1, 2, 3, 4]).unwrap();

        let mut output = [0u8; 4];
        io.read_at(10, &mut output).unwrap();
        assert_eq!(output, [1, 2, 3, 4]);
        assert_eq!(io.stream_len().unwrap(), 14);
    }

    #[test]
    fn test_read_past_end_is_out_of_bounds() {
        let mut file = tempfile().unwrap();
        let mut io = StdRimIO::new(&mut file);
        io.write_at(0, &[0xAB; 32]).unwrap();

        let mut output = [0u8; 16];
        assert_eq!(io.read_at(24, &mut output), Err(RimIOError::OutOfBounds));
    }

    #[test]
    fn test_partition_offset() {
        let mut file = tempfile().unwrap();
        let mut io = StdRimIO::new(&mut file);
        io.write_u32_be_at(512, 0xCAFE_F00D).unwrap();

        io.set_offset(512);
        assert_eq!(io.partition_offset(), 512);
        assert_eq!(io.read_u32_be_at(0).unwrap(), 0xCAFE_F00D);
    }

    #[test]
    fn test_zero_fill() {
        let mut file = tempfile().unwrap();
        let mut io = StdRimIO::new(&mut file);

        io.write_at(42, &[0xFF; 8]).unwrap();
        io.zero_fill(42, 8).unwrap();

        let mut buf = [0xAA; 8];
        io.read_at(42, &mut buf).unwrap();

        assert_eq!(buf, [0u8; 8]);
    }
}
