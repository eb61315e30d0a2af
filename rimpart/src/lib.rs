// SPDX-License-Identifier: MIT
#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc;

mod io_ext;

pub mod errors;
/// Primary GUID Partition Table (GPT) reader and writer.
#[cfg(feature = "alloc")]
pub mod gpt;
/// Master Boot Record (MBR) and Protective MBR.
pub mod mbr;

/// Partition extents and the "is this range covered" predicate.
#[cfg(feature = "alloc")]
pub mod coverage;
#[cfg(feature = "alloc")]
pub use coverage::{PartitionExtent, PartitionMap, PartitionScanOptions, TableKind};

pub const DEFAULT_SECTOR_SIZE: u64 = 512;
