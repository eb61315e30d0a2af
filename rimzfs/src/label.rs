// SPDX-License-Identifier: MIT
//! Vdev label placement.
//!
//! A vdev carries four copies of its label: L0/L1 at the start of the device,
//! L2/L3 at the end. The tail copies are aligned down to a label slot, so the
//! last `size % VDEV_LABEL_SIZE` bytes of the device are unused padding.

use crate::constant::*;

/// Byte offset of label `index` (0..4) on a device of `size` bytes.
///
/// Returns `None` for an out-of-range index, or when the device cannot hold
/// four label slots.
pub fn label_offset(size: u64, index: usize) -> Option<u64> {
    if index >= VDEV_LABELS {
        return None;
    }
    let i = index as u64;
    let pad = size % VDEV_LABEL_SIZE;
    let base = i * VDEV_LABEL_SIZE;
    if index < VDEV_LABELS / 2 {
        return Some(base);
    }
    let tail = size.checked_sub(VDEV_LABELS as u64 * VDEV_LABEL_SIZE + pad)?;
    base.checked_add(tail)
}

/// One candidate label location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelSlot {
    pub index: usize,
    /// Start of the 256 KiB label slot
    pub offset: u64,
    /// Start of the nvlist window (`offset + 16 KiB`)
    pub window_offset: u64,
}

impl LabelSlot {
    pub fn new(size: u64, index: usize) -> Option<Self> {
        let offset = label_offset(size, index)?;
        Some(Self {
            index,
            offset,
            window_offset: offset + VDEV_LABEL_NVPAIR,
        })
    }

    /// Byte range `[start, end)` of the nvlist window.
    #[inline]
    pub fn window_range(&self) -> (u64, u64) {
        (
            self.window_offset,
            self.window_offset + VDEV_PHYS_SIZE as u64,
        )
    }
}

/// The four label slots of a device, in probing order.
pub fn label_slots(size: u64) -> impl Iterator<Item = LabelSlot> {
    (0..VDEV_LABELS).filter_map(move |i| LabelSlot::new(size, i))
}
