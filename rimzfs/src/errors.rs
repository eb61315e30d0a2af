// SPDX-License-Identifier: MIT

use core::fmt;

pub use rimio::errors::*;
use rimpart::errors::PartError;

/// Error type for ZFS label probing.
///
/// None of these escape [`crate::probe_zfs`]: a failing candidate is skipped
/// and the probe reports "no match". They surface from the lower-level
/// functions (header validation, nvlist walking, wiping).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZfsError {
    IO(RimIOError),
    Part(PartError),
    /// Device smaller than the minimal vdev size.
    TooSmall,
    /// Label header rejected before any nvlist parsing.
    BadHeader(&'static str),
    /// Entry stream violates its own bounds or carries an unknown type.
    Malformed(&'static str),
    /// The result sink refused a value.
    Sink(&'static str),
    Other(&'static str),
}

impl ZfsError {
    pub fn msg(&self) -> &'static str {
        match self {
            ZfsError::IO(e) => e.msg(),
            ZfsError::Part(e) => e.msg(),
            ZfsError::TooSmall => "Device too small for a ZFS vdev",
            ZfsError::BadHeader(msg) => msg,
            ZfsError::Malformed(msg) => msg,
            ZfsError::Sink(msg) => msg,
            ZfsError::Other(msg) => msg,
        }
    }

    pub fn source(&self) -> Option<ZfsError> {
        match self {
            ZfsError::Part(PartError::IO(e)) => Some(ZfsError::IO(*e)),
            _ => None,
        }
    }
}

impl fmt::Display for ZfsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.msg())?;
        let mut current = self.source();
        while let Some(src) = current {
            write!(f, "\n  caused by: {}", src.msg())?;
            current = src.source();
        }
        Ok(())
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ZfsError {}

impl From<RimIOError> for ZfsError {
    fn from(e: RimIOError) -> Self {
        ZfsError::IO(e)
    }
}

impl From<PartError> for ZfsError {
    fn from(e: PartError) -> Self {
        ZfsError::Part(e)
    }
}

impl From<&'static str> for ZfsError {
    fn from(msg: &'static str) -> Self {
        ZfsError::Other(msg)
    }
}

pub type ZfsResult<T = ()> = Result<T, ZfsError>;
