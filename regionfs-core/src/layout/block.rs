//! File block records.

use crate::error::Result;
use crate::region::Region;
use crate::types::RegionOffset;

/// Size of a file block record in bytes.
pub const FILE_BLOCK_SIZE: u64 = 24;

/// One node of a file's data chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileBlock {
    /// Bytes of file content held by this block.
    pub block_size: u64,
    /// Next block in the chain, or null.
    pub next: RegionOffset,
    /// Payload offset of this block's data allocation.
    pub data: RegionOffset,
}

impl FileBlock {
    /// Read the block record at `at`.
    pub fn load(region: &Region<'_>, at: RegionOffset) -> Result<Self> {
        let base = at.as_u64();
        Ok(Self {
            block_size: region.read_u64(at)?,
            next: region.read_offset(RegionOffset::new(base + 8))?,
            data: region.read_offset(RegionOffset::new(base + 16))?,
        })
    }

    /// Write the block record at `at`.
    pub fn store(&self, region: &mut Region<'_>, at: RegionOffset) -> Result<()> {
        let base = at.as_u64();
        region.write_u64(at, self.block_size)?;
        region.write_offset(RegionOffset::new(base + 8), self.next)?;
        region.write_offset(RegionOffset::new(base + 16), self.data)
    }

    /// Relink the `next` field of the block at `at`.
    pub fn set_next(region: &mut Region<'_>, at: RegionOffset, next: RegionOffset) -> Result<()> {
        region.write_offset(RegionOffset::new(at.as_u64() + 8), next)
    }
}
