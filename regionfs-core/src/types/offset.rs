//! Offsets into a region.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Byte offset from the base of a region.
///
/// Every reference stored inside a region is an offset, never a host
/// address, because the region may be mapped at a different base address on
/// every mount. Offset 0 is occupied by the superblock and doubles as the
/// "no location" value.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[repr(transparent)]
pub struct RegionOffset(u64);

impl RegionOffset {
    /// The null/absent offset.
    pub const NULL: Self = Self(0);

    /// Create a new region offset.
    #[must_use]
    pub const fn new(offset: u64) -> Self {
        Self(offset)
    }

    /// Get the raw offset value.
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Check if this is the null offset.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        self.0 == 0
    }

    /// Add a byte distance, returning `None` on overflow.
    #[must_use]
    pub const fn checked_add(&self, bytes: u64) -> Option<Self> {
        match self.0.checked_add(bytes) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Subtract a byte distance, returning `None` on underflow.
    #[must_use]
    pub const fn checked_sub(&self, bytes: u64) -> Option<Self> {
        match self.0.checked_sub(bytes) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Convert to `Option`, mapping the null offset to `None`.
    #[must_use]
    pub const fn non_null(self) -> Option<Self> {
        if self.is_null() { None } else { Some(self) }
    }
}

impl fmt::Display for RegionOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

impl From<u64> for RegionOffset {
    fn from(offset: u64) -> Self {
        Self(offset)
    }
}

impl From<Option<RegionOffset>> for RegionOffset {
    fn from(offset: Option<RegionOffset>) -> Self {
        offset.unwrap_or(Self::NULL)
    }
}
