// SPDX-License-Identifier: MIT
#![cfg_attr(not(feature = "std"), no_std)]

// Core modules
pub mod errors;
mod macros;

// Backend modules
#[cfg(feature = "mem")]
mod mem;

#[cfg(feature = "std")]
mod std;

// Prelude re-exports (central entrypoint)
pub mod prelude {
    pub use super::RimIO;
    pub use super::RimIOExt;
    pub use super::RimIOStructExt;
    pub use super::errors::*;

    #[cfg(feature = "mem")]
    pub use super::mem::MemRimIO;

    #[cfg(feature = "std")]
    pub use super::std::StdRimIO;
}

// Internal use
use errors::*;

// Constants

/// Size of the internal scratch buffer used by chunked and zero-fill helpers.
/// 4 KiB = typical page size and common disk sector size.
pub const BLOCK_BUF_SIZE: usize = 4096;

// Traits

/// Block IO abstraction trait.
///
/// Reads and writes at arbitrary offsets relative to the current partition offset.
/// Implementations may target RAM, files or block devices.
///
/// A read either fills the whole buffer or fails: there is no partial success.
pub trait RimIO {
    /// Writes `data` at `offset`.
    fn write_at(&mut self, offset: u64, data: &[u8]) -> RimIOResult;

    /// Reads exactly `buf.len()` bytes into `buf` from `offset`.
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> RimIOResult;

    /// Flushes any buffered data (may be a no-op).
    fn flush(&mut self) -> RimIOResult;

    /// Moves the origin of all offsets, returns the new origin.
    fn set_offset(&mut self, partition_offset: u64) -> u64;

    fn partition_offset(&self) -> u64;
}

/// Extension helpers for RimIO.
///
/// - chunked reads
/// - zero fill (signature wiping, region clearing)
/// - big-endian primitive reads/writes (read_u32_be_at, ...)
pub trait RimIOExt: RimIO {
    /// Reads `buf.len()` bytes from `offset` in chunks of `chunk_size` or less.
    #[inline(always)]
    fn read_in_chunks(&mut self, offset: u64, buf: &mut [u8], chunk_size: usize) -> RimIOResult {
        if chunk_size == 0 {
            return Err(RimIOError::Invalid("read_in_chunks: zero chunk size"));
        }
        let mut off = offset;
        for chunk in buf.chunks_mut(chunk_size) {
            self.read_at(off, chunk)?;
            off = off
                .checked_add(chunk.len() as u64)
                .ok_or(RimIOError::OutOfBounds)?;
        }
        Ok(())
    }

    /// Fills a region with zeroes.
    #[inline(always)]
    fn zero_fill(&mut self, offset: u64, len: usize) -> RimIOResult {
        const ZERO_BUF: [u8; BLOCK_BUF_SIZE] = [0u8; BLOCK_BUF_SIZE];
        let mut remaining = len;
        let mut off = offset;
        while remaining > 0 {
            let chunk = remaining.min(ZERO_BUF.len());
            self.write_at(off, &ZERO_BUF[..chunk])?;
            off += chunk as u64;
            remaining -= chunk;
        }
        Ok(())
    }

    // Implements big-endian read/write helpers for primitive types
    RimIO_impl_primitive_be_rw!(u16, u32, u64);
}

impl<T: RimIO + ?Sized> RimIOExt for T {}

/// Extension trait for reading and writing structs using zerocopy.
///
/// Requires the struct to implement zerocopy traits for safe conversion.
pub trait RimIOStructExt: RimIO {
    /// Reads a struct of type `T` from the given offset.
    fn read_struct<T: zerocopy::FromBytes + zerocopy::KnownLayout + zerocopy::Immutable>(
        &mut self,
        offset: u64,
    ) -> RimIOResult<T> {
        let size = core::mem::size_of::<T>();
        if size > BLOCK_BUF_SIZE {
            return Err(RimIOError::Invalid("read_struct: type too large"));
        }
        let mut buf = [0u8; BLOCK_BUF_SIZE];
        self.read_at(offset, &mut buf[..size])?;
        T::read_from_bytes(&buf[..size]).map_err(|_| RimIOError::Other("read_struct failed"))
    }

    /// Writes a struct of type `T` at the given offset.
    fn write_struct<T: zerocopy::IntoBytes + zerocopy::KnownLayout + zerocopy::Immutable>(
        &mut self,
        offset: u64,
        val: &T,
    ) -> RimIOResult {
        self.write_at(offset, val.as_bytes())
    }
}

impl<T: RimIO + ?Sized> RimIOStructExt for T {}
