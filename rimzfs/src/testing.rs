// SPDX-License-Identifier: MIT
//! Fixture builders: an XDR nvlist encoder and label images.
//!
//! Built for unit tests, and for the integration tests and benches through the
//! `testing` feature (`cargo test -p rimzfs --features testing`).

use alloc::vec;
use alloc::vec::Vec;

use rimio::prelude::*;

use crate::{constant::*, errors::*, label::LabelSlot, pool::PoolState};

/// Presence-only flag, the type pool feature lists use.
const DATA_TYPE_BOOLEAN: u32 = 1;

#[inline]
fn pad4(n: usize) -> usize {
    (n + 3) & !3
}

/// XDR nvlist encoder, builder style.
///
/// ```
/// use rimzfs::testing::NvListBuilder;
///
/// let list = NvListBuilder::new()
///     .uint64("version", 5000)
///     .string("name", "tank")
///     .directory("vdev_tree", |d| d.uint64("ashift", 12))
///     .finish();
/// assert_eq!(&list[list.len() - 8..], &[0u8; 8]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct NvListBuilder {
    buf: Vec<u8>,
}

impl NvListBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn pair(mut self, name: &str, size: usize, tag: u32, nelem: u32, data: &[u8]) -> Self {
        let b = &mut self.buf;
        b.extend_from_slice(&(size as u32).to_be_bytes());
        b.extend_from_slice(&(size as u32).to_be_bytes());
        b.extend_from_slice(&(name.len() as u32).to_be_bytes());
        b.extend_from_slice(name.as_bytes());
        b.resize(b.len() + pad4(name.len()) - name.len(), 0);
        b.extend_from_slice(&tag.to_be_bytes());
        b.extend_from_slice(&nelem.to_be_bytes());
        b.extend_from_slice(data);
        b.resize(b.len() + pad4(data.len()) - data.len(), 0);
        self
    }

    fn pair_size(name: &str, data_len: usize) -> usize {
        NVPAIR_PREFIX_SIZE + pad4(name.len()) + 8 + pad4(data_len)
    }

    pub fn uint64(self, name: &str, value: u64) -> Self {
        let data = value.to_be_bytes();
        let size = Self::pair_size(name, data.len());
        self.pair(name, size, DATA_TYPE_UINT64, 1, &data)
    }

    pub fn string(self, name: &str, value: &str) -> Self {
        let mut data = Vec::with_capacity(4 + value.len());
        data.extend_from_slice(&(value.len() as u32).to_be_bytes());
        data.extend_from_slice(value.as_bytes());
        let size = Self::pair_size(name, data.len());
        self.pair(name, size, DATA_TYPE_STRING, 1, &data)
    }

    /// Pair of an arbitrary type with an opaque payload.
    pub fn other(self, name: &str, tag: u32, payload: &[u8]) -> Self {
        let size = Self::pair_size(name, payload.len());
        self.pair(name, size, tag, 1, payload)
    }

    /// Directory pair without its nested pairs nor terminator.
    pub fn directory_open(self, name: &str) -> Self {
        // nested nvlist version + flags
        let mut marker = [0u8; 8];
        marker[4..].copy_from_slice(&1u32.to_be_bytes());
        let size = Self::pair_size(name, marker.len());
        self.pair(name, size, DATA_TYPE_NVLIST, 1, &marker)
    }

    /// Directory pair, its nested pairs, and the nested list terminator.
    pub fn directory(self, name: &str, nested: impl FnOnce(NvListBuilder) -> NvListBuilder) -> Self {
        let mut this = self.directory_open(name);
        let inner = nested(NvListBuilder::new()).finish();
        this.buf.extend_from_slice(&inner);
        this
    }

    /// Appends bytes as-is.
    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    /// Pairs followed by the 8-byte list terminator.
    pub fn finish(mut self) -> Vec<u8> {
        self.buf.extend_from_slice(&[0u8; NVLIST_END_SIZE]);
        self.buf
    }
}

/// A full nvlist window (`VDEV_PHYS_SIZE` bytes): XDR stream header, then `pairs`.
///
/// `pairs` is truncated if it does not fit.
pub fn label_window(pairs: &[u8]) -> Vec<u8> {
    let mut window = vec![0u8; VDEV_PHYS_SIZE];
    window[0] = NV_ENCODE_XDR;
    window[1] = NV_LITTLE_ENDIAN;
    // nvl_version 0, nvl_nvflag NV_UNIQUE_NAME
    window[8..12].copy_from_slice(&1u32.to_be_bytes());
    let n = pairs.len().min(VDEV_PHYS_SIZE - NVLIST_PREAMBLE_SIZE);
    window[NVLIST_PREAMBLE_SIZE..NVLIST_PREAMBLE_SIZE + n].copy_from_slice(&pairs[..n]);
    window
}

/// Writes `window` at the nvlist offset of label `index`.
pub fn write_label<IO: RimIO + ?Sized>(
    io: &mut IO,
    device_size: u64,
    index: usize,
    window: &[u8],
) -> ZfsResult<()> {
    let slot = LabelSlot::new(device_size, index).ok_or(ZfsError::TooSmall)?;
    io.write_at(slot.window_offset, window)?;
    Ok(())
}

/// Label content the way a pool writes it for a single-disk vdev.
#[derive(Debug, Clone)]
pub struct LabelImage {
    pub pool_name: &'static str,
    pub version: u64,
    pub state: u64,
    pub txg: u64,
    pub pool_guid: u64,
    pub guid: u64,
    pub ashift: u64,
}

impl Default for LabelImage {
    fn default() -> Self {
        Self {
            pool_name: "tank",
            version: 5000,
            state: PoolState::Active as u64,
            txg: 1234,
            pool_guid: 0x1122_3344_5566_7788,
            guid: 0x0BAD_CAFE_0000_0001,
            ashift: 12,
        }
    }
}

impl LabelImage {
    pub fn with_state(mut self, state: PoolState) -> Self {
        self.state = state as u64;
        self
    }

    pub fn with_txg(mut self, txg: u64) -> Self {
        self.txg = txg;
        self
    }

    pub fn with_guid(mut self, guid: u64) -> Self {
        self.guid = guid;
        self
    }

    pub fn nvlist(&self) -> Vec<u8> {
        NvListBuilder::new()
            .uint64("version", self.version)
            .string("name", self.pool_name)
            .uint64("state", self.state)
            .uint64("txg", self.txg)
            .uint64("pool_guid", self.pool_guid)
            .uint64("errata", 0)
            .uint64("hostid", 0x7F00_0101)
            .string("hostname", "storage01")
            .uint64("top_guid", self.guid)
            .uint64("guid", self.guid)
            .uint64("vdev_children", 1)
            .directory("vdev_tree", |d| {
                d.string("type", "disk")
                    .uint64("id", 0)
                    .uint64("guid", self.guid)
                    .string("path", "/dev/sdb1")
                    .uint64("whole_disk", 1)
                    .uint64("metaslab_array", 256)
                    .uint64("metaslab_shift", 29)
                    .uint64("ashift", self.ashift)
                    .uint64("asize", 64 * 1024 * 1024 * 1024)
                    .uint64("is_log", 0)
                    .uint64("create_txg", 4)
            })
            .directory("features_for_read", |d| {
                d.other("com.delphix:hole_birth", DATA_TYPE_BOOLEAN, &[])
                    .other("com.delphix:embedded_data", DATA_TYPE_BOOLEAN, &[])
            })
            .finish()
    }

    pub fn window(&self) -> Vec<u8> {
        label_window(&self.nvlist())
    }

    /// Writes this label at every slot in `indices`.
    pub fn write_to<IO: RimIO + ?Sized>(
        &self,
        io: &mut IO,
        device_size: u64,
        indices: &[usize],
    ) -> ZfsResult<()> {
        let window = self.window();
        for &i in indices {
            write_label(io, device_size, i, &window)?;
        }
        Ok(())
    }
}
