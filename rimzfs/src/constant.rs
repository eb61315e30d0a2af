// SPDX-License-Identifier: MIT
// rimzfs/constant.rs

// === Vdev label geometry ===

/// Labels per vdev: two at the start of the device, two at the end.
pub const VDEV_LABELS: usize = 4;

/// Size of one label slot.
pub const VDEV_LABEL_SIZE: u64 = 256 * 1024;

/// Offset of the packed nvlist inside a label slot (after blank space + boot header).
pub const VDEV_LABEL_NVPAIR: u64 = 16 * 1024;

/// Size of the nvlist area (`vdev_phys_t`), the only part of a label we read.
pub const VDEV_PHYS_SIZE: usize = 112 * 1024;

/// Smallest device ZFS will build a vdev on.
pub const ZFS_MIN_DEVICE_SIZE: u64 = 64 * 1024 * 1024;

// === nvlist stream header ===

pub const NVS_HEADER_SIZE: usize = 16;

/// Stream header (4 bytes) + nvlist version + nvlist flags, where the first pair starts.
pub const NVLIST_PREAMBLE_SIZE: usize = 12;

/// XDR is the only encoding used on disk.
pub const NV_ENCODE_XDR: u8 = 1;
pub const NV_ENCODE_NATIVE: u8 = 0;

pub const NV_BIG_ENDIAN: u8 = 0;
pub const NV_LITTLE_ENDIAN: u8 = 1;

// === nvpair layout ===

/// encoded size + decoded size + name length
pub const NVPAIR_PREFIX_SIZE: usize = 12;

/// Two zero words closing an embedded nvlist.
pub const NVLIST_END_SIZE: usize = 8;

/// type + element count + nested nvlist version + flags
pub const NV_DIRECTORY_SIZE: usize = 16;

/// type + element count + string length
pub const NV_STRING_PREFIX_SIZE: usize = 12;

// === nvpair data types ===

pub const DATA_TYPE_UNKNOWN: u32 = 0;
pub const DATA_TYPE_UINT64: u32 = 8;
pub const DATA_TYPE_STRING: u32 = 9;
pub const DATA_TYPE_NVLIST: u32 = 19;

// === Label keys ===

pub const ZPOOL_CONFIG_VERSION: &[u8] = b"version";
pub const ZPOOL_CONFIG_POOL_NAME: &[u8] = b"name";
pub const ZPOOL_CONFIG_POOL_STATE: &[u8] = b"state";
pub const ZPOOL_CONFIG_POOL_TXG: &[u8] = b"txg";
pub const ZPOOL_CONFIG_POOL_GUID: &[u8] = b"pool_guid";
pub const ZPOOL_CONFIG_GUID: &[u8] = b"guid";
pub const ZPOOL_CONFIG_ASHIFT: &[u8] = b"ashift";

// === Extraction ===

/// Fields surfaced by full extraction: name, guid, pool_guid, ashift, version.
pub const ZFS_WANTED_FIELDS: usize = 5;

/// Length of the wipe signature (the whole stream header).
pub const ZFS_SIGNATURE_SIZE: usize = NVS_HEADER_SIZE;
