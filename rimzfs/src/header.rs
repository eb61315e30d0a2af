// SPDX-License-Identifier: MIT
//! nvlist stream header found at the start of every label's nvpair area.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::{constant::*, errors::*};

/// Stream header (16 bytes).
///
/// The last word is the encoded size of the first nvpair: the pair stream
/// starts 12 bytes in, so it overlaps this header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoBytes, FromBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct NvsHeader {
    /// Encoding method (`NV_ENCODE_*`)
    pub encoding: u8,
    /// Endianness of the host that wrote the list
    pub endian: u8,
    pub reserved1: u8,
    pub reserved2: u8,
    /// nvlist version (big-endian on disk)
    pub nvl_version: u32,
    /// nvlist flags (big-endian on disk)
    pub nvl_flags: u32,
    /// Encoded size of the first nvpair (big-endian on disk)
    pub first_size: u32,
}

impl NvsHeader {
    /// Parses the first 16 bytes of `bytes`.
    pub fn from_prefix(bytes: &[u8]) -> ZfsResult<Self> {
        Self::read_from_prefix(bytes)
            .map(|(hdr, _)| hdr)
            .map_err(|_| ZfsError::BadHeader("header truncated"))
    }

    #[inline]
    pub fn first_size(&self) -> u32 {
        u32::from_be(self.first_size)
    }

    /// Cheap filter run before any nvlist parsing.
    ///
    /// Acceptance only looks at `encoding`, `endian` and `first_size`.
    pub fn validate(&self) -> ZfsResult<()> {
        if self.encoding != NV_ENCODE_XDR {
            return Err(ZfsError::BadHeader("unsupported nvlist encoding"));
        }
        if self.endian > NV_LITTLE_ENDIAN {
            return Err(ZfsError::BadHeader("invalid nvlist endianness"));
        }
        if self.first_size() == 0 {
            return Err(ZfsError::BadHeader("empty nvlist"));
        }
        Ok(())
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Raw on-disk bytes, echoed back as the wipe signature.
    #[inline]
    pub fn to_bytes(&self) -> [u8; NVS_HEADER_SIZE] {
        let mut out = [0u8; NVS_HEADER_SIZE];
        out.copy_from_slice(self.as_bytes());
        out
    }
}
