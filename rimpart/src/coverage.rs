// SPDX-License-Identifier: MIT

use alloc::vec::Vec;

use rimio::prelude::*;

use crate::{
    DEFAULT_SECTOR_SIZE,
    errors::*,
    gpt,
    mbr::{self, MbrKind},
};

/// Options for reading the partition table of a disk
#[derive(Clone, Copy, Debug)]
pub struct PartitionScanOptions {
    /// Logical sector (LBA) size in bytes
    pub sector_size: u64,
    /// Validate GPT header/entries CRC
    pub validate_crc: bool,
}

impl Default for PartitionScanOptions {
    fn default() -> Self {
        Self {
            sector_size: DEFAULT_SECTOR_SIZE,
            validate_crc: true,
        }
    }
}

impl PartitionScanOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn no_crc(mut self) -> Self {
        self.validate_crc = false;
        self
    }

    pub fn with_sector_size(mut self, sz: u64) -> Self {
        self.sector_size = sz;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    None,
    Mbr,
    Gpt,
}

/// Byte extent of one partition, `[start, start + size)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionExtent {
    pub index: usize,
    pub start: u64,
    pub size: u64,
}

impl PartitionExtent {
    #[inline]
    pub fn end(&self) -> u64 {
        self.start.saturating_add(self.size)
    }

    /// True when `[offset, offset + len)` lies entirely inside this extent.
    #[inline]
    pub fn contains(&self, offset: u64, len: u64) -> bool {
        match offset.checked_add(len) {
            Some(end) => self.start <= offset && end <= self.end(),
            None => false,
        }
    }
}

/// Partitions recognized on a whole disk, used to answer
/// "is this byte range already claimed by a partition table".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionMap {
    table: TableKind,
    extents: Vec<PartitionExtent>,
}

impl Default for PartitionMap {
    fn default() -> Self {
        Self::empty()
    }
}

impl PartitionMap {
    /// No partition table: nothing is covered.
    pub fn empty() -> Self {
        Self {
            table: TableKind::None,
            extents: Vec::new(),
        }
    }

    /// Reads the MBR and, behind a protective entry, the primary GPT.
    ///
    /// Partitions that do not fit inside `disk_size` are dropped: a table
    /// pointing past the end of the device does not claim anything on it.
    pub fn scan<IO: RimIO + ?Sized>(
        io: &mut IO,
        disk_size: u64,
        opts: PartitionScanOptions,
    ) -> PartResult<Self> {
        let sector_size = opts.sector_size;
        if sector_size == 0 || !sector_size.is_power_of_two() {
            return Err(PartError::Invalid("sector size must be a power of two"));
        }

        let mbr = mbr::read_mbr(io)?;
        let mut ranges: Vec<(u64, u64)> = Vec::new();

        let table = match mbr.kind() {
            MbrKind::Empty => return Ok(Self::empty()),
            MbrKind::Legacy => {
                for e in mbr.aligned_entries().iter().filter(|e| !e.is_empty()) {
                    ranges.push(e.byte_range(sector_size)?);
                }
                TableKind::Mbr
            }
            MbrKind::Protective => {
                let (_hdr, entries) = gpt::read_gpt(io, sector_size, opts.validate_crc)?;
                for e in &entries {
                    ranges.push(e.byte_range(sector_size)?);
                }
                TableKind::Gpt
            }
        };

        let extents = ranges
            .into_iter()
            .enumerate()
            .filter(|&(_, (_, end))| end <= disk_size)
            .map(|(index, (start, end))| PartitionExtent {
                index,
                start,
                size: end - start,
            })
            .collect();

        Ok(Self { table, extents })
    }

    #[inline]
    pub fn table(&self) -> TableKind {
        self.table
    }

    #[inline]
    pub fn extents(&self) -> &[PartitionExtent] {
        &self.extents
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.extents.is_empty()
    }

    /// Extent of the partition at table slot `index`.
    pub fn get(&self, index: usize) -> Option<&PartitionExtent> {
        self.extents.iter().find(|e| e.index == index)
    }

    /// True when one recognized partition holds all of `[offset, offset + len)`.
    pub fn is_covered(&self, offset: u64, len: u64) -> bool {
        self.extents.iter().any(|e| e.contains(offset, len))
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::*;
    use crate::gpt::GptEntry;
    use crate::mbr::MbrEntry;

    const SECTORS: u64 = 20_000;

    #[test]
    fn blank_disk_covers_nothing() {
        let mut buf = vec![0u8; 512 * 64];
        let mut io = MemRimIO::new(&mut buf);

        let map = PartitionMap::scan(&mut io, 512 * 64, PartitionScanOptions::default()).unwrap();
        assert_eq!(map.table(), TableKind::None);
        assert!(!map.is_covered(0, 512 * 64));
    }

    #[test]
    fn gpt_partitions_claim_their_ranges() {
        let mut buf = vec![0u8; (512 * SECTORS) as usize];
        let mut io = MemRimIO::new(&mut buf);

        mbr::write_mbr_protective(&mut io, SECTORS).unwrap();
        let p1 = GptEntry::new([1; 16], [1; 16], 2048, 4095, "esp");
        let p2 = GptEntry::new([2; 16], [2; 16], 4096, 10_000, "data");
        gpt::write_gpt(&mut io, &[p1, p2], SECTORS, [0xAB; 16], 512).unwrap();

        let map = PartitionMap::scan(&mut io, 512 * SECTORS, PartitionScanOptions::new()).unwrap();
        assert_eq!(map.table(), TableKind::Gpt);
        assert_eq!(map.extents().len(), 2);
        assert_eq!(map.get(1).unwrap().start, 4096 * 512);

        // GPT header area and the tail after the last partition are free
        assert!(!map.is_covered(0, 2048 * 512));
        assert!(!map.is_covered(10_001 * 512, 512));
        // Straddling the start of p1 or spanning both partitions is not covered
        assert!(!map.is_covered(2047 * 512, 1024));
        assert!(!map.is_covered(4000 * 512, 512 * 200));
        assert!(map.is_covered(5000 * 512, 16));
        assert!(map.is_covered(2048 * 512, 2048 * 512));
    }

    #[test]
    fn legacy_mbr_entries_are_used() {
        let mut buf = vec![0u8; 512 * 4096];
        let mut io = MemRimIO::new(&mut buf);

        let mut es = [MbrEntry::new_empty(); 4];
        es[0] = MbrEntry::new(0x80, 0x83, 2048, 1024);
        mbr::write_mbr_from_entries(&mut io, es).unwrap();

        let map = PartitionMap::scan(&mut io, 512 * 4096, PartitionScanOptions::default()).unwrap();
        assert_eq!(map.table(), TableKind::Mbr);
        assert!(map.is_covered(2048 * 512, 1));
        assert!(map.is_covered(2048 * 512, 1024 * 512));
        assert!(!map.is_covered(2048 * 512, 1024 * 512 + 1));
        assert!(!map.is_covered(3072 * 512, 512));
    }

    #[test]
    fn partitions_past_the_device_are_dropped() {
        let mut buf = vec![0u8; 512 * 4096];
        let mut io = MemRimIO::new(&mut buf);

        let mut es = [MbrEntry::new_empty(); 4];
        es[0] = MbrEntry::new(0x00, 0x83, 2048, 1_000_000);
        es[1] = MbrEntry::new(0x00, 0x83, 100, 100);
        mbr::write_mbr_from_entries(&mut io, es).unwrap();

        let map = PartitionMap::scan(&mut io, 512 * 4096, PartitionScanOptions::default()).unwrap();
        assert_eq!(map.extents().len(), 1);
        assert!(map.get(0).is_none());
        assert!(map.get(1).is_some());
        assert!(!map.is_covered(3000 * 512, 512));
    }

    #[test]
    fn protective_mbr_without_gpt_is_an_error() {
        let mut buf = vec![0u8; 512 * 4096];
        let mut io = MemRimIO::new(&mut buf);
        mbr::write_mbr_protective(&mut io, 4096).unwrap();

        assert!(PartitionMap::scan(&mut io, 512 * 4096, PartitionScanOptions::default()).is_err());
    }
}
