// SPDX-License-Identifier: MIT

use alloc::vec;
use alloc::vec::Vec;

use rimio::prelude::*;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::{errors::*, io_ext::RimIOLbaExt};

pub const GPT_ENTRY_SIZE: usize = 128;
pub const GPT_PRIMARY_HEADER_LBA: u64 = 1;
pub const GPT_PRIMARY_ENTRIES_LBA: u64 = 2;
pub const GPT_DEFAULT_NUM_ENTRIES: usize = 128;
pub const GPT_SIGNATURE: &[u8; 8] = b"EFI PART";
pub const GPT_REVISION: u32 = 0x00010000;
pub const GPT_HEADER_SIZE: u32 = 92;

const GPT_MAX_ENTRIES: usize = 16_384;

pub fn encode_gpt_name(name: &str) -> [u16; 36] {
    let mut buf = [0u16; 36];
    for (i, c) in name.encode_utf16().take(36).enumerate() {
        buf[i] = c;
    }
    buf
}

#[derive(IntoBytes, FromBytes, KnownLayout, Immutable, Copy, Clone, Debug)]
#[repr(C)]
pub struct GptEntry {
    pub type_guid: [u8; 16],
    pub unique_guid: [u8; 16],
    pub start_lba: u64,
    pub end_lba: u64,
    pub attributes: u64,
    pub name: [u16; 36],
}

impl GptEntry {
    pub fn new(
        type_guid: [u8; 16],
        unique_guid: [u8; 16],
        start_lba: u64,
        end_lba: u64,
        name: &str,
    ) -> Self {
        Self {
            type_guid,
            unique_guid,
            start_lba,
            end_lba,
            attributes: 0,
            name: encode_gpt_name(name),
        }
    }

    /// Unused slots carry an all-zero type GUID.
    #[inline]
    pub fn is_unused(&self) -> bool {
        self.type_guid.iter().all(|&b| b == 0)
    }

    /// Byte range `[start, end)`, `end_lba` being inclusive on disk.
    pub fn byte_range(&self, sector_size: u64) -> PartResult<(u64, u64)> {
        if self.end_lba < self.start_lba {
            return Err(PartError::Invalid("GPT: partition ends before it starts"));
        }
        let start = self
            .start_lba
            .checked_mul(sector_size)
            .ok_or(PartError::Invalid("GPT: start overflow"))?;
        let end = (self.end_lba + 1)
            .checked_mul(sector_size)
            .ok_or(PartError::Invalid("GPT: end overflow"))?;
        Ok((start, end))
    }
}

#[derive(IntoBytes, FromBytes, KnownLayout, Immutable, Copy, Clone, Debug)]
#[repr(C)]
pub struct GptHeader {
    pub signature: [u8; 8],
    pub revision: u32,
    pub header_size: u32,
    pub header_crc: u32,
    pub reserved: u32,
    pub current_lba: u64,
    pub backup_lba: u64,
    pub first_usable_lba: u64,
    pub last_usable_lba: u64,
    pub disk_guid: [u8; 16],
    pub entries_lba: u64,
    pub num_entries: u32,
    pub entry_size: u32,
    pub entries_crc: u32,
    pub reserved2: [u8; 420],
}

impl GptHeader {
    /// Primary header for a disk of `total_sectors` with the default table geometry.
    pub fn new_primary(
        total_sectors: u64,
        disk_guid: [u8; 16],
        sector_size: u64,
    ) -> PartResult<Self> {
        let num_entries = GPT_DEFAULT_NUM_ENTRIES as u32;
        let entry_size = GPT_ENTRY_SIZE as u32;
        let entries_sectors = (num_entries as u64 * entry_size as u64).div_ceil(sector_size);

        let first_usable_lba = GPT_PRIMARY_ENTRIES_LBA + entries_sectors;
        let last_usable_lba = total_sectors
            .checked_sub(2 + entries_sectors)
            .filter(|&last| last >= first_usable_lba)
            .ok_or(PartError::Other("GPT: disk too small (headers/tables)"))?;

        Ok(Self {
            signature: *GPT_SIGNATURE,
            revision: GPT_REVISION,
            header_size: GPT_HEADER_SIZE,
            header_crc: 0,
            reserved: 0,
            current_lba: GPT_PRIMARY_HEADER_LBA,
            backup_lba: total_sectors - 1,
            first_usable_lba,
            last_usable_lba,
            disk_guid,
            entries_lba: GPT_PRIMARY_ENTRIES_LBA,
            num_entries,
            entry_size,
            entries_crc: 0,
            reserved2: [0u8; 420],
        })
    }

    fn compute_header_crc32(&self) -> u32 {
        let mut copy = *self;
        copy.header_crc = 0;
        let len = (copy.header_size as usize).min(core::mem::size_of::<GptHeader>());
        crc32fast::hash(&copy.as_bytes()[..len])
    }

    pub fn validate_header(&self) -> PartResult<()> {
        if &self.signature != GPT_SIGNATURE {
            return Err(PartError::Invalid("GPT: invalid signature"));
        }
        if self.revision != GPT_REVISION {
            return Err(PartError::Invalid("GPT: unsupported revision"));
        }
        if self.header_size < GPT_HEADER_SIZE || self.header_size > 512 {
            return Err(PartError::Invalid("GPT: invalid header_size"));
        }
        let base = core::mem::size_of::<GptEntry>() as u32;
        if self.entry_size < base || self.entry_size > 512 || (self.entry_size % 8) != 0 {
            return Err(PartError::Invalid("GPT: invalid entry_size"));
        }
        let ne = self.num_entries as usize;
        if ne == 0 || ne > GPT_MAX_ENTRIES {
            return Err(PartError::Invalid("GPT: num_entries out of range"));
        }
        Ok(())
    }

    pub fn validate_crc(&self, raw_entries: &[u8]) -> PartResult<()> {
        if self.compute_header_crc32() != self.header_crc {
            return Err(PartError::Invalid("GPT: header CRC mismatch"));
        }
        if crc32fast::hash(raw_entries) != self.entries_crc {
            return Err(PartError::Invalid("GPT: entries CRC mismatch"));
        }
        Ok(())
    }
}

fn encode_entries(entries: &[GptEntry], num_entries: usize, entry_size: usize) -> Vec<u8> {
    let base = core::mem::size_of::<GptEntry>();
    let mut raw = vec![0u8; num_entries * entry_size];
    for (slot, e) in raw.chunks_exact_mut(entry_size).zip(entries) {
        slot[..base].copy_from_slice(e.as_bytes());
    }
    raw
}

fn decode_entries(raw: &[u8], entry_size: usize) -> PartResult<Vec<GptEntry>> {
    let base = core::mem::size_of::<GptEntry>();
    let mut out = Vec::new();
    for slot in raw.chunks_exact(entry_size) {
        let e = GptEntry::read_from_bytes(&slot[..base])
            .map_err(|_| PartError::Invalid("GPT: invalid entry"))?;
        if !e.is_unused() {
            out.push(e);
        }
    }
    Ok(out)
}

/// Writes primary and backup GPT structures; the protective MBR is written separately.
pub fn write_gpt<IO: RimIO + ?Sized>(
    io: &mut IO,
    entries: &[GptEntry],
    total_sectors: u64,
    disk_guid: [u8; 16],
    sector_size: u64,
) -> PartResult<()> {
    if entries.len() > GPT_DEFAULT_NUM_ENTRIES {
        return Err(PartError::Invalid("GPT: too many entries"));
    }
    let mut primary = GptHeader::new_primary(total_sectors, disk_guid, sector_size)?;
    let raw = encode_entries(entries, primary.num_entries as usize, primary.entry_size as usize);
    primary.entries_crc = crc32fast::hash(&raw);
    primary.header_crc = primary.compute_header_crc32();

    io.write_at_lba(primary.entries_lba, sector_size, &raw)?;
    io.write_struct_lba(GPT_PRIMARY_HEADER_LBA, sector_size, &primary)?;

    let mut backup = primary;
    backup.current_lba = primary.backup_lba;
    backup.backup_lba = GPT_PRIMARY_HEADER_LBA;
    backup.entries_lba = primary.last_usable_lba + 1;
    backup.header_crc = backup.compute_header_crc32();

    io.write_at_lba(backup.entries_lba, sector_size, &raw)?;
    io.write_struct_lba(backup.current_lba, sector_size, &backup)?;

    io.flush()?;
    Ok(())
}

/// Reads and validates the primary GPT header and its used entries.
pub fn read_gpt<IO: RimIO + ?Sized>(
    io: &mut IO,
    sector_size: u64,
    validate_crc: bool,
) -> PartResult<(GptHeader, Vec<GptEntry>)> {
    let hdr: GptHeader = io.read_struct_lba(GPT_PRIMARY_HEADER_LBA, sector_size)?;
    hdr.validate_header()?;

    let buf_len = (hdr.num_entries as usize)
        .checked_mul(hdr.entry_size as usize)
        .ok_or(PartError::Invalid("GPT: entries byte length overflow"))?;
    let mut raw = vec![0u8; buf_len];
    io.read_at_lba(hdr.entries_lba, sector_size, &mut raw)?;

    if validate_crc {
        hdr.validate_crc(&raw)?;
    }

    let entries = decode_entries(&raw, hdr.entry_size as usize)?;
    Ok((hdr, entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DEFAULT_SECTOR_SIZE;

    #[test]
    fn write_and_parse_gpt() {
        let mut buf = vec![0u8; 512 * 20_000];
        let mut io = MemRimIO::new(&mut buf);

        let part = GptEntry::new([1; 16], [2; 16], 2048, 4095, "test");
        write_gpt(&mut io, &[part], 20_000, [0xAB; 16], DEFAULT_SECTOR_SIZE).unwrap();

        let (header, parts) = read_gpt(&mut io, DEFAULT_SECTOR_SIZE, true).unwrap();
        assert_eq!(header.signature, *GPT_SIGNATURE);
        assert_eq!(header.disk_guid, [0xAB; 16]);
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].start_lba, 2048);
        assert_eq!(parts[0].byte_range(512).unwrap(), (2048 * 512, 4096 * 512));
    }

    #[test]
    fn corrupted_entries_fail_crc_only_when_checked() {
        let mut buf = vec![0u8; 512 * 20_000];
        let mut io = MemRimIO::new(&mut buf);

        let part = GptEntry::new([1; 16], [2; 16], 2048, 4095, "data");
        write_gpt(&mut io, &[part], 20_000, [0xAB; 16], DEFAULT_SECTOR_SIZE).unwrap();
        io.write_at(2 * 512 + 100, &[0x42]).unwrap();

        assert!(read_gpt(&mut io, DEFAULT_SECTOR_SIZE, true).is_err());
        assert!(read_gpt(&mut io, DEFAULT_SECTOR_SIZE, false).is_ok());
    }

    #[test]
    fn missing_gpt_is_invalid() {
        let mut buf = vec![0u8; 512 * 64];
        let mut io = MemRimIO::new(&mut buf);
        assert_eq!(
            read_gpt(&mut io, DEFAULT_SECTOR_SIZE, true).unwrap_err(),
            PartError::Invalid("GPT: invalid signature")
        );
    }

    #[test]
    fn inverted_entry_has_no_range() {
        let e = GptEntry::new([1; 16], [2; 16], 10, 5, "bad");
        assert!(e.byte_range(512).is_err());
    }
}
