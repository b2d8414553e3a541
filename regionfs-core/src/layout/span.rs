//! Span headers shared by free blocks and allocations.

use crate::error::Result;
use crate::region::Region;
use crate::types::RegionOffset;

/// Every span and every payload starts on this boundary.
pub const ALIGNMENT: u64 = 8;

/// Size of the header in front of every span.
pub const SPAN_HEADER_SIZE: u64 = 16;

/// Round `n` up to [`ALIGNMENT`]; `None` on overflow.
pub fn align_up(n: u64) -> Option<u64> {
    n.checked_add(ALIGNMENT - 1).map(|n| n & !(ALIGNMENT - 1))
}

/// Total span size (header included) needed for a payload of `request` bytes.
pub fn span_size_for(request: u64) -> Option<u64> {
    align_up(request)?.checked_add(SPAN_HEADER_SIZE)
}

/// The 16 byte header in front of each span.
///
/// `size` counts the whole span including the header. `next` links free
/// spans in address order and is zero while the span is allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanHeader {
    /// Total span size in bytes.
    pub size: u64,
    /// Next free span, or null.
    pub next: RegionOffset,
}

impl SpanHeader {
    /// Read the header at `at`.
    pub fn load(region: &Region<'_>, at: RegionOffset) -> Result<Self> {
        Ok(Self {
            size: region.read_u64(at)?,
            next: region.read_offset(RegionOffset::new(at.as_u64() + 8))?,
        })
    }

    /// Write the header at `at`.
    pub fn store(&self, region: &mut Region<'_>, at: RegionOffset) -> Result<()> {
        region.write_u64(at, self.size)?;
        region.write_offset(RegionOffset::new(at.as_u64() + 8), self.next)
    }

    /// Payload bytes available behind this header.
    pub fn capacity(&self) -> u64 {
        self.size.saturating_sub(SPAN_HEADER_SIZE)
    }

    /// Offset one past the end of a span starting at `at`.
    pub fn end(&self, at: RegionOffset) -> Option<RegionOffset> {
        at.checked_add(self.size)
    }
}
