//! Superblock record.

use super::span::{ALIGNMENT, SPAN_HEADER_SIZE, SpanHeader};
use crate::error::{FsError, Result};
use crate::region::Region;
use crate::types::RegionOffset;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Cursor};

/// Magic number marking a formatted region ("RFS1").
pub const REGION_MAGIC: u32 = 0x3153_4652;

/// Current layout version.
pub const REGION_VERSION: u32 = 1;

/// Fixed size of the superblock in bytes.
pub const SUPERBLOCK_SIZE: u64 = 32;

/// Smallest region the filesystem accepts.
pub const MIN_REGION_SIZE: u64 = 2048;

const SIZE_FIELD: RegionOffset = RegionOffset::new(8);
const FREE_HEAD_FIELD: RegionOffset = RegionOffset::new(16);
const ROOT_FIELD: RegionOffset = RegionOffset::new(24);

/// The record at offset 0 anchoring the free list and the root directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Superblock {
    /// Magic number; anything else means "never formatted".
    pub magic: u32,
    /// Layout version.
    pub version: u32,
    /// Usable heap bytes following the superblock.
    pub size: u64,
    /// First free span, in address order.
    pub free_head: RegionOffset,
    /// Root directory inode, created on first lookup.
    pub root: RegionOffset,
}

impl Superblock {
    /// Build the superblock of a freshly formatted region of `region_len`
    /// bytes: the whole heap is one free span.
    pub fn format(region_len: u64) -> Self {
        let size = region_len.saturating_sub(SUPERBLOCK_SIZE) & !(ALIGNMENT - 1);
        let free_head = if size >= SPAN_HEADER_SIZE {
            RegionOffset::new(SUPERBLOCK_SIZE)
        } else {
            RegionOffset::NULL
        };
        Self {
            magic: REGION_MAGIC,
            version: REGION_VERSION,
            size,
            free_head,
            root: RegionOffset::NULL,
        }
    }

    /// Offset of the first heap byte.
    pub const fn heap_start() -> RegionOffset {
        RegionOffset::new(SUPERBLOCK_SIZE)
    }

    /// Offset one past the last heap byte.
    pub fn heap_end(&self) -> RegionOffset {
        RegionOffset::new(SUPERBLOCK_SIZE + self.size)
    }

    /// Validate the superblock against the region it was read from.
    pub fn validate(&self, region_len: u64) -> std::result::Result<(), &'static str> {
        if self.magic != REGION_MAGIC {
            return Err("Invalid magic number");
        }
        if self.version != REGION_VERSION {
            return Err("Unsupported layout version");
        }
        if self.size % ALIGNMENT != 0 {
            return Err("Heap size is not aligned");
        }
        if SUPERBLOCK_SIZE
            .checked_add(self.size)
            .is_none_or(|end| end > region_len)
        {
            return Err("Heap size exceeds region");
        }
        let in_heap = |offset: RegionOffset| {
            offset.is_null()
                || (offset >= Self::heap_start() && offset < self.heap_end())
        };
        if !in_heap(self.free_head) {
            return Err("Free list head outside heap");
        }
        if !in_heap(self.root) {
            return Err("Root inode outside heap");
        }
        Ok(())
    }

    /// Read a superblock from a byte slice.
    pub fn from_bytes(bytes: &[u8]) -> io::Result<Self> {
        if (bytes.len() as u64) < SUPERBLOCK_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Buffer too small for superblock",
            ));
        }

        let mut cursor = Cursor::new(bytes);
        Ok(Self {
            magic: cursor.read_u32::<LittleEndian>()?,
            version: cursor.read_u32::<LittleEndian>()?,
            size: cursor.read_u64::<LittleEndian>()?,
            free_head: RegionOffset::new(cursor.read_u64::<LittleEndian>()?),
            root: RegionOffset::new(cursor.read_u64::<LittleEndian>()?),
        })
    }

    /// Write the superblock to a byte buffer.
    pub fn to_bytes(&self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(SUPERBLOCK_SIZE as usize);
        buf.write_u32::<LittleEndian>(self.magic)?;
        buf.write_u32::<LittleEndian>(self.version)?;
        buf.write_u64::<LittleEndian>(self.size)?;
        buf.write_u64::<LittleEndian>(self.free_head.as_u64())?;
        buf.write_u64::<LittleEndian>(self.root.as_u64())?;

        debug_assert_eq!(buf.len() as u64, SUPERBLOCK_SIZE);
        Ok(buf)
    }

    /// Check whether the region carries a superblock at all.
    pub fn is_formatted(region: &Region<'_>) -> Result<bool> {
        Ok(region.read_u32(RegionOffset::NULL)? == REGION_MAGIC)
    }

    /// Load and validate the superblock of a region.
    pub fn load(region: &Region<'_>) -> Result<Self> {
        let bytes = region
            .bytes(RegionOffset::NULL, SUPERBLOCK_SIZE)
            .map_err(|_| FsError::bad_region("Region smaller than superblock"))?;
        let superblock =
            Self::from_bytes(bytes).map_err(|e| FsError::bad_region(e.to_string()))?;
        superblock
            .validate(region.len())
            .map_err(FsError::bad_region)?;
        Ok(superblock)
    }

    /// Store the superblock at offset 0.
    pub fn store(&self, region: &mut Region<'_>) -> Result<()> {
        let bytes = self
            .to_bytes()
            .map_err(|e| FsError::bad_region(e.to_string()))?;
        region
            .bytes_mut(RegionOffset::NULL, SUPERBLOCK_SIZE)?
            .copy_from_slice(&bytes);
        Ok(())
    }

    /// Format a region in place: write the superblock and a single free span.
    pub fn format_region(region: &mut Region<'_>) -> Result<Self> {
        if region.len() < MIN_REGION_SIZE {
            return Err(FsError::bad_region(format!(
                "Region of {} bytes is below the {} byte minimum",
                region.len(),
                MIN_REGION_SIZE
            )));
        }
        let superblock = Self::format(region.len());
        if !superblock.free_head.is_null() {
            SpanHeader {
                size: superblock.size,
                next: RegionOffset::NULL,
            }
            .store(region, superblock.free_head)?;
        }
        superblock.store(region)?;
        Ok(superblock)
    }

    /// Read the heap size field.
    pub fn read_size(region: &Region<'_>) -> Result<u64> {
        region.read_u64(SIZE_FIELD)
    }

    /// Read the free list head field.
    pub fn read_free_head(region: &Region<'_>) -> Result<RegionOffset> {
        region.read_offset(FREE_HEAD_FIELD)
    }

    /// Update the free list head field.
    pub fn write_free_head(region: &mut Region<'_>, head: RegionOffset) -> Result<()> {
        region.write_offset(FREE_HEAD_FIELD, head)
    }

    /// Read the root inode field.
    pub fn read_root(region: &Region<'_>) -> Result<RegionOffset> {
        region.read_offset(ROOT_FIELD)
    }

    /// Update the root inode field.
    pub fn write_root(region: &mut Region<'_>, root: RegionOffset) -> Result<()> {
        region.write_offset(ROOT_FIELD, root)
    }
}
