// SPDX-License-Identifier: MIT
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod constant;
pub mod errors;
/// nvlist stream header and its acceptance filter.
pub mod header;
/// Placement of the four vdev labels.
pub mod label;
/// XDR nvlist walker and the two label passes.
pub mod nvlist;
pub mod pool;
/// Device probing, result sink and wiping.
pub mod probe;
/// Fixture images for tests and benches.
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use header::NvsHeader;
pub use label::{LabelSlot, label_offset, label_slots};
pub use nvlist::{LabelInfo, extract_label_info, scan_vitals};
pub use pool::{LabelVitals, PoolState};
pub use probe::{
    DeviceKind, DeviceView, NoPartitions, PartitionCoverage, ProbeSink, ProbeValues, ZfsMatch,
    ZfsProbeOptions, confirmed_labels, find_zfs_label, probe_zfs, wipe_signatures,
};

pub mod prelude {
    pub use super::errors::*;
    pub use super::probe::*;
    pub use super::{LabelInfo, LabelVitals, NvsHeader, PoolState};
}
