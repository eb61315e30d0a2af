// SPDX-License-Identifier: MIT

//! LBA-addressed helpers so table code never multiplies by the sector size
//! by hand. Every conversion is overflow-checked.

use rimio::prelude::*;

use crate::errors::*;

/// Byte offset of `lba` for the given sector size.
#[inline]
pub(crate) fn lba_to_offset(lba: u64, sector_size: u64) -> PartResult<u64> {
    lba.checked_mul(sector_size)
        .ok_or(PartError::Invalid("LBA offset overflow"))
}

pub(crate) trait RimIOLbaExt: RimIO {
    #[inline]
    fn read_at_lba(&mut self, lba: u64, sector_size: u64, buf: &mut [u8]) -> PartResult<()> {
        let off = lba_to_offset(lba, sector_size)?;
        Ok(self.read_at(off, buf)?)
    }

    #[inline]
    fn write_at_lba(&mut self, lba: u64, sector_size: u64, data: &[u8]) -> PartResult<()> {
        let off = lba_to_offset(lba, sector_size)?;
        Ok(self.write_at(off, data)?)
    }

    #[inline]
    fn read_struct_lba<T>(&mut self, lba: u64, sector_size: u64) -> PartResult<T>
    where
        T: zerocopy::FromBytes + zerocopy::KnownLayout + zerocopy::Immutable,
    {
        let off = lba_to_offset(lba, sector_size)?;
        Ok(self.read_struct::<T>(off)?)
    }

    #[inline]
    fn write_struct_lba<T>(&mut self, lba: u64, sector_size: u64, val: &T) -> PartResult<()>
    where
        T: zerocopy::IntoBytes + zerocopy::KnownLayout + zerocopy::Immutable,
    {
        let off = lba_to_offset(lba, sector_size)?;
        Ok(self.write_struct::<T>(off, val)?)
    }
}

impl<T: RimIO + ?Sized> RimIOLbaExt for T {}
