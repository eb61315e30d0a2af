// SPDX-License-Identifier: MIT

use rimio::prelude::*;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::errors::*;

pub const MBR_SIGNATURE: [u8; 2] = [0x55, 0xAA];
pub const PROTECTIVE_GPT: u8 = 0xEE;

/// One of the four primary entries, in host order.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MbrEntry {
    pub boot_flag: u8,
    pub part_type: u8,
    pub start_lba: u32,
    pub sectors: u32,
}

impl MbrEntry {
    #[inline]
    pub fn new(boot_flag: u8, part_type: u8, start_lba: u32, sectors: u32) -> Self {
        Self {
            boot_flag,
            part_type,
            start_lba,
            sectors,
        }
    }

    #[inline]
    pub fn new_empty() -> Self {
        Self::new(0x00, 0x00, 0, 0)
    }

    #[inline]
    pub fn new_protective(total_sectors: u64) -> Self {
        let sectors = total_sectors.saturating_sub(1).min(u32::MAX as u64) as u32;
        Self::new(0x00, PROTECTIVE_GPT, 1, sectors)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.part_type == 0 || self.sectors == 0
    }

    #[inline]
    pub fn is_protective(&self) -> bool {
        self.part_type == PROTECTIVE_GPT
    }

    /// Byte range `[start, end)` of this entry.
    pub fn byte_range(&self, sector_size: u64) -> PartResult<(u64, u64)> {
        let start = (self.start_lba as u64)
            .checked_mul(sector_size)
            .ok_or(PartError::Invalid("MBR: start overflow"))?;
        let len = (self.sectors as u64)
            .checked_mul(sector_size)
            .ok_or(PartError::Invalid("MBR: size overflow"))?;
        Ok((start, start + len))
    }
}

/// On-disk entry layout (little-endian, unaligned).
#[derive(IntoBytes, FromBytes, KnownLayout, Immutable, Copy, Clone, Debug)]
#[repr(C, packed)]
pub struct MbrEntryPacked {
    pub boot_flag: u8,
    pub starting_chs: [u8; 3],
    pub part_type: u8,
    pub end_chs: [u8; 3],
    pub start_lba: u32,
    pub sectors: u32,
}

impl MbrEntryPacked {
    #[inline]
    pub fn to_aligned(self) -> MbrEntry {
        MbrEntry {
            boot_flag: self.boot_flag,
            part_type: self.part_type,
            start_lba: u32::from_le(self.start_lba),
            sectors: u32::from_le(self.sectors),
        }
    }

    #[inline]
    pub fn from_aligned(e: &MbrEntry) -> Self {
        // CHS fields are left at the "use LBA" marker values
        let (starting_chs, end_chs) = if e.is_empty() {
            ([0; 3], [0; 3])
        } else {
            ([0x00, 0x02, 0x00], [0xFE, 0xFF, 0xFF])
        };
        Self {
            boot_flag: e.boot_flag,
            starting_chs,
            part_type: e.part_type,
            end_chs,
            start_lba: e.start_lba.to_le(),
            sectors: e.sectors.to_le(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MbrKind {
    Empty,
    Protective,
    Legacy,
}

#[derive(IntoBytes, FromBytes, KnownLayout, Immutable, Copy, Clone, Debug)]
#[repr(C, packed)]
pub struct Mbr {
    pub boot_code: [u8; 446],
    pub entries: [MbrEntryPacked; 4],
    pub signature: [u8; 2],
}

impl Mbr {
    #[inline]
    pub fn new_from_entries(entries: [MbrEntry; 4]) -> Self {
        Self {
            boot_code: [0u8; 446],
            entries: entries.map(|e| MbrEntryPacked::from_aligned(&e)),
            signature: MBR_SIGNATURE,
        }
    }

    #[inline]
    pub fn new_protective(total_sectors: u64) -> Self {
        let mut es = [MbrEntry::new_empty(); 4];
        es[0] = MbrEntry::new_protective(total_sectors);
        Self::new_from_entries(es)
    }

    #[inline]
    pub fn has_valid_signature(&self) -> bool {
        self.signature == MBR_SIGNATURE
    }

    #[inline]
    pub fn aligned_entries(&self) -> [MbrEntry; 4] {
        let entries = self.entries;
        entries.map(MbrEntryPacked::to_aligned)
    }

    /// Classifies the sector. A missing boot signature reads as `Empty`.
    pub fn kind(&self) -> MbrKind {
        if !self.has_valid_signature() {
            return MbrKind::Empty;
        }
        let es = self.aligned_entries();
        if es.iter().any(|e| e.is_protective()) {
            MbrKind::Protective
        } else if es.iter().any(|e| !e.is_empty()) {
            MbrKind::Legacy
        } else {
            MbrKind::Empty
        }
    }
}

pub fn write_mbr<IO: RimIO + ?Sized>(io: &mut IO, mbr: &Mbr) -> PartResult<()> {
    io.write_struct(0, mbr)?;
    io.flush()?;
    Ok(())
}

pub fn write_mbr_protective<IO: RimIO + ?Sized>(io: &mut IO, total_sectors: u64) -> PartResult<()> {
    write_mbr(io, &Mbr::new_protective(total_sectors))
}

pub fn write_mbr_from_entries<IO: RimIO + ?Sized>(
    io: &mut IO,
    entries: [MbrEntry; 4],
) -> PartResult<()> {
    write_mbr(io, &Mbr::new_from_entries(entries))
}

/// Reads sector 0 without validating it; see [`Mbr::kind`].
pub fn read_mbr<IO: RimIO + ?Sized>(io: &mut IO) -> PartResult<Mbr> {
    Ok(io.read_struct(0)?)
}
