// SPDX-License-Identifier: MIT

use core::fmt;

/// Result type for RimIO operations.
pub type RimIOResult<T = ()> = core::result::Result<T, RimIOError>;

/// Error type for RimIO operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RimIOError {
    /// Short read/write or backend failure.
    Io(&'static str),
    OutOfBounds,
    Invalid(&'static str),
    Unsupported,
    Other(&'static str),
}

impl RimIOError {
    pub fn msg(&self) -> &'static str {
        match self {
            RimIOError::Io(msg) => msg,
            RimIOError::OutOfBounds => "Out of bounds",
            RimIOError::Invalid(msg) => msg,
            RimIOError::Unsupported => "Unsupported operation",
            RimIOError::Other(msg) => msg,
        }
    }
}

impl From<&'static str> for RimIOError {
    #[inline]
    fn from(msg: &'static str) -> Self {
        RimIOError::Other(msg)
    }
}

impl fmt::Display for RimIOError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.msg())
    }
}

#[cfg(feature = "std")]
impl std::error::Error for RimIOError {}
