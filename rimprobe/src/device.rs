// SPDX-License-Identifier: MIT
// rimprobe/src/device.rs

use std::fs::{File, OpenOptions};
use std::path::Path;

use anyhow::{Context, bail};
use rimio::prelude::*;
use rimpart::{PartitionMap, PartitionScanOptions};
use rimzfs::DeviceKind;

use crate::{log_normal, log_verbose};

/// Opened target: the file handle plus what the probe needs to know about it.
pub struct Target {
    pub file: File,
    pub kind: DeviceKind,
    /// Size of the whole file or device
    pub disk_size: u64,
}

#[cfg(unix)]
fn is_block_device(file: &File) -> std::io::Result<bool> {
    use std::os::unix::fs::FileTypeExt;
    Ok(file.metadata()?.file_type().is_block_device())
}

#[cfg(not(unix))]
fn is_block_device(file: &File) -> std::io::Result<bool> {
    Ok(!file.metadata()?.is_file())
}

impl Target {
    pub fn open(path: &Path, writable: bool) -> anyhow::Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(writable)
            .open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;

        let kind = if is_block_device(&file)? {
            DeviceKind::WholeDisk
        } else {
            DeviceKind::RegularFile
        };
        let disk_size = StdRimIO::new(&mut file)
            .stream_len()
            .with_context(|| format!("Failed to size {}", path.display()))?;

        log_verbose!("{} is a {:?} of {} bytes", path.display(), kind, disk_size);
        Ok(Self {
            file,
            kind,
            disk_size,
        })
    }

    /// Partition table of the target. A table that cannot be read covers nothing.
    pub fn partition_map(&mut self, opts: PartitionScanOptions) -> PartitionMap {
        let mut io = StdRimIO::new(&mut self.file);
        match PartitionMap::scan(&mut io, self.disk_size, opts) {
            Ok(map) => {
                log_verbose!(
                    "partition table: {:?}, {} partition(s)",
                    map.table(),
                    map.extents().len()
                );
                map
            }
            Err(e) => {
                log_normal!("Ignoring unreadable partition table: {e}");
                PartitionMap::empty()
            }
        }
    }
}

/// Byte offset and size of partition `index` in `map`.
pub fn partition_window(map: &PartitionMap, index: usize) -> anyhow::Result<(u64, u64)> {
    match map.get(index) {
        Some(ext) => Ok((ext.start, ext.size)),
        None => bail!(
            "No partition {index} ({} partition(s) in a {:?} table)",
            map.extents().len(),
            map.table()
        ),
    }
}
