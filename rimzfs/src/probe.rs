// SPDX-License-Identifier: MIT
//! Device-level probing: label locator, header filter, both nvlist passes,
//! result reporting and signature wiping.

use alloc::format;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use rimio::prelude::*;
use rimpart::PartitionMap;

use crate::{
    constant::*,
    errors::*,
    header::NvsHeader,
    label::{LabelSlot, label_slots},
    nvlist::{LabelInfo, extract_label_info, scan_vitals},
    pool::{LabelVitals, PoolState},
};

/// How the caller opened the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    /// Disk image or any other regular file
    RegularFile,
    /// Whole block device, may carry a partition table
    WholeDisk,
    /// A single partition; its own table does not apply
    Partition,
}

impl DeviceKind {
    /// Only whole-disk objects can have their labels shadowed by a partition table.
    #[inline]
    pub fn checks_partition_table(self) -> bool {
        matches!(self, DeviceKind::RegularFile | DeviceKind::WholeDisk)
    }
}

/// "Is this byte range already claimed by a recognized partition table".
pub trait PartitionCoverage {
    fn is_covered(&self, offset: u64, len: u64) -> bool;
}

impl PartitionCoverage for PartitionMap {
    fn is_covered(&self, offset: u64, len: u64) -> bool {
        PartitionMap::is_covered(self, offset, len)
    }
}

/// Coverage for devices without a partition table.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPartitions;

impl PartitionCoverage for NoPartitions {
    fn is_covered(&self, _offset: u64, _len: u64) -> bool {
        false
    }
}

/// Bounded device handed to the probe.
pub struct DeviceView<'a> {
    pub io: &'a mut dyn RimIO,
    /// Total size in bytes, relative to the io partition offset
    pub size: u64,
    pub kind: DeviceKind,
    partitions: &'a dyn PartitionCoverage,
}

impl<'a> DeviceView<'a> {
    pub fn new(io: &'a mut dyn RimIO, size: u64, kind: DeviceKind) -> Self {
        Self {
            io,
            size,
            kind,
            partitions: &NoPartitions,
        }
    }

    pub fn with_partitions(mut self, partitions: &'a dyn PartitionCoverage) -> Self {
        self.partitions = partitions;
        self
    }

    #[inline]
    pub fn is_covered(&self, offset: u64, len: u64) -> bool {
        self.partitions.is_covered(offset, len)
    }
}

/// Receives the identification results.
pub trait ProbeSink {
    /// Registers the bytes a wipe must zero. A failure cancels the match.
    fn set_signature_region(&mut self, offset: u64, magic: &[u8]) -> ZfsResult<()>;
    fn set_label(&mut self, label: &str);
    fn set_secondary_id(&mut self, id: &str);
    fn set_primary_id(&mut self, raw: &[u8; 8], id: &str);
    fn set_block_size(&mut self, size: u32);
    fn set_version(&mut self, version: &str);
}

/// Sink that keeps every reported value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeValues {
    pub signature: Option<(u64, Vec<u8>)>,
    pub label: Option<String>,
    pub secondary_id: Option<String>,
    pub primary_id: Option<([u8; 8], String)>,
    pub block_size: Option<u32>,
    pub version: Option<String>,
}

impl ProbeSink for ProbeValues {
    fn set_signature_region(&mut self, offset: u64, magic: &[u8]) -> ZfsResult<()> {
        self.signature = Some((offset, magic.to_vec()));
        Ok(())
    }

    fn set_label(&mut self, label: &str) {
        self.label = Some(label.into());
    }

    fn set_secondary_id(&mut self, id: &str) {
        self.secondary_id = Some(id.into());
    }

    fn set_primary_id(&mut self, raw: &[u8; 8], id: &str) {
        self.primary_id = Some((*raw, id.into()));
    }

    fn set_block_size(&mut self, size: u32) {
        self.block_size = Some(size);
    }

    fn set_version(&mut self, version: &str) {
        self.version = Some(version.into());
    }
}

/// Probe configuration.
#[derive(Clone, Copy, Debug)]
pub struct ZfsProbeOptions {
    /// Devices below this size are never probed
    pub min_device_size: u64,
    /// Stop full extraction after this many fields, `None` walks the whole list
    pub max_found_fields: Option<usize>,
    /// Skip labels hidden under a partition of a whole disk
    pub honor_partition_table: bool,
}

impl Default for ZfsProbeOptions {
    fn default() -> Self {
        Self {
            min_device_size: ZFS_MIN_DEVICE_SIZE,
            max_found_fields: Some(ZFS_WANTED_FIELDS),
            honor_partition_table: true,
        }
    }
}

impl ZfsProbeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn full_scan(mut self) -> Self {
        self.max_found_fields = None;
        self
    }

    pub fn no_pt_check(mut self) -> Self {
        self.honor_partition_table = false;
        self
    }

    pub fn with_min_device_size(mut self, size: u64) -> Self {
        self.min_device_size = size;
        self
    }
}

/// A confirmed label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZfsMatch {
    /// Label slot (0..4) that confirmed first
    pub label_index: usize,
    /// Device offset of the nvlist window, where the signature lives
    pub window_offset: u64,
    pub header: NvsHeader,
    pub vitals: LabelVitals,
    pub info: LabelInfo,
}

impl ZfsMatch {
    /// Bytes a wipe must zero, at [`Self::window_offset`].
    #[inline]
    pub fn signature(&self) -> [u8; ZFS_SIGNATURE_SIZE] {
        self.header.to_bytes()
    }

    #[inline]
    pub fn state(&self) -> Option<PoolState> {
        self.vitals.pool_state()
    }

    /// Pushes the match into `sink`, signature region first.
    pub fn report<S: ProbeSink + ?Sized>(&self, sink: &mut S) -> ZfsResult<()> {
        sink.set_signature_region(self.window_offset, &self.signature())?;

        let info = &self.info;
        if let Some(name) = &info.pool_name {
            sink.set_label(name);
        }
        if let Some(guid) = info.guid {
            sink.set_secondary_id(&format!("{guid}"));
        }
        if let Some(pool_guid) = info.pool_guid {
            sink.set_primary_id(&pool_guid.to_be_bytes(), &format!("{pool_guid}"));
        }
        if let Some(bs) = info.block_size() {
            sink.set_block_size(bs);
        }
        if let Some(version) = info.version {
            sink.set_version(&format!("{version}"));
        }
        Ok(())
    }
}

/// Reads and validates the 16-byte header of a slot, then its whole window.
fn read_candidate(dev: &mut DeviceView<'_>, slot: &LabelSlot, window: &mut [u8]) -> ZfsResult<NvsHeader> {
    let header: NvsHeader = dev.io.read_struct(slot.window_offset)?;
    header.validate()?;
    dev.io.read_at(slot.window_offset, window)?;
    Ok(header)
}

fn probe_slot(
    dev: &mut DeviceView<'_>,
    slot: &LabelSlot,
    opts: &ZfsProbeOptions,
    window: &mut [u8],
) -> ZfsResult<Option<ZfsMatch>> {
    if opts.honor_partition_table
        && dev.kind.checks_partition_table()
        && dev.is_covered(slot.window_offset, VDEV_PHYS_SIZE as u64)
    {
        log::debug!("zfs: label {} covered by a partition, skipped", slot.index);
        return Ok(None);
    }

    let header = read_candidate(dev, slot, window)?;
    let vitals = scan_vitals(window)?;
    if !vitals.is_genuine() {
        log::debug!("zfs: label {} not live: {:?}", slot.index, vitals);
        return Ok(None);
    }

    let info = extract_label_info(window, opts.max_found_fields);
    Ok(Some(ZfsMatch {
        label_index: slot.index,
        window_offset: slot.window_offset,
        header,
        vitals,
        info,
    }))
}

/// Every confirmed label of the device, in slot order.
pub fn confirmed_labels(dev: &mut DeviceView<'_>, opts: &ZfsProbeOptions) -> Vec<ZfsMatch> {
    let mut found = Vec::new();
    if dev.size < opts.min_device_size {
        log::debug!("zfs: device too small ({} bytes)", dev.size);
        return found;
    }

    let mut window = vec![0u8; VDEV_PHYS_SIZE];
    for slot in label_slots(dev.size) {
        match probe_slot(dev, &slot, opts, &mut window) {
            Ok(Some(m)) => found.push(m),
            Ok(None) => {}
            Err(e) => log::debug!("zfs: label {} @{:#x} rejected: {}", slot.index, slot.offset, e),
        }
    }
    found
}

/// First confirmed label, without reporting anything.
pub fn find_zfs_label(dev: &mut DeviceView<'_>, opts: &ZfsProbeOptions) -> Option<ZfsMatch> {
    if dev.size < opts.min_device_size {
        log::debug!("zfs: device too small ({} bytes)", dev.size);
        return None;
    }

    let mut window = vec![0u8; VDEV_PHYS_SIZE];
    for slot in label_slots(dev.size) {
        match probe_slot(dev, &slot, opts, &mut window) {
            Ok(Some(m)) => {
                log::debug!(
                    "zfs: label {} confirmed (guid={:#x} state={:?} txg={})",
                    m.label_index,
                    m.vitals.guid,
                    m.state(),
                    m.vitals.txg
                );
                return Some(m);
            }
            Ok(None) => {}
            Err(e) => log::debug!("zfs: label {} @{:#x} rejected: {}", slot.index, slot.offset, e),
        }
    }
    None
}

/// Probes `dev` and reports the first confirmed label to `sink`.
///
/// `None` means "not ZFS": unreadable, rejected and dead labels are all
/// skipped, and a sink refusing the signature region cancels the match.
pub fn probe_zfs<S: ProbeSink + ?Sized>(
    dev: &mut DeviceView<'_>,
    sink: &mut S,
    opts: &ZfsProbeOptions,
) -> Option<ZfsMatch> {
    let m = find_zfs_label(dev, opts)?;
    match m.report(sink) {
        Ok(()) => Some(m),
        Err(e) => {
            log::debug!("zfs: match dropped: {}", e);
            None
        }
    }
}

/// Zeroes the signature region of each confirmed label until none is left.
///
/// Returns the wiped offsets in wipe order.
pub fn wipe_signatures(dev: &mut DeviceView<'_>, opts: &ZfsProbeOptions) -> ZfsResult<Vec<u64>> {
    let mut wiped = Vec::new();
    // one pass per label, plus the pass that finds nothing
    for _ in 0..=VDEV_LABELS {
        let Some(m) = find_zfs_label(dev, opts) else {
            dev.io.flush()?;
            return Ok(wiped);
        };
        dev.io.zero_fill(m.window_offset, ZFS_SIGNATURE_SIZE)?;
        log::debug!("zfs: wiped label {} @{:#x}", m.label_index, m.window_offset);
        wiped.push(m.window_offset);
    }
    Err(ZfsError::Other("zfs: label still present after wipe"))
}
