//! Address translation over a region.
//!
//! A [`Region`] is a mutable view of the whole filesystem buffer. It is the
//! only place where offsets meet host memory: [`Region::to_offset`] and
//! [`Region::to_ptr`] convert between the two, and every field accessor is
//! bounds-checked so a damaged region surfaces as [`FsError::Corrupted`]
//! instead of a panic.

use crate::error::{FsError, Result};
use crate::types::RegionOffset;
use byteorder::{ByteOrder, LittleEndian};
use std::ops::Range;
use std::ptr::NonNull;

/// A mutable, offset-addressed view of a filesystem region.
pub struct Region<'r> {
    bytes: &'r mut [u8],
}

impl<'r> Region<'r> {
    /// Wrap a region buffer.
    pub fn new(bytes: &'r mut [u8]) -> Self {
        Self { bytes }
    }

    /// Total length of the region in bytes.
    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Check if the region is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Translate a host address into an offset from the region base.
    ///
    /// Addresses outside the region translate to [`RegionOffset::NULL`].
    pub fn to_offset(&self, ptr: *const u8) -> RegionOffset {
        let base = self.bytes.as_ptr() as usize;
        let addr = ptr as usize;
        if addr < base || addr >= base + self.bytes.len() {
            return RegionOffset::NULL;
        }
        RegionOffset::new((addr - base) as u64)
    }

    /// Translate an offset into a host address in the current mapping.
    ///
    /// The null offset and offsets past the end have no address.
    pub fn to_ptr(&self, offset: RegionOffset) -> Option<NonNull<u8>> {
        let index = usize::try_from(offset.non_null()?.as_u64()).ok()?;
        self.bytes.get(index).map(NonNull::from)
    }

    fn range(&self, offset: RegionOffset, len: u64) -> Result<Range<usize>> {
        let end = offset
            .as_u64()
            .checked_add(len)
            .filter(|end| *end <= self.len())
            .ok_or_else(|| {
                FsError::corrupted(
                    offset,
                    format!("{} bytes at offset run past region end {}", len, self.len()),
                )
            })?;
        Ok(offset.as_u64() as usize..end as usize)
    }

    /// Borrow `len` bytes starting at `offset`.
    pub fn bytes(&self, offset: RegionOffset, len: u64) -> Result<&[u8]> {
        let range = self.range(offset, len)?;
        Ok(&self.bytes[range])
    }

    /// Mutably borrow `len` bytes starting at `offset`.
    pub fn bytes_mut(&mut self, offset: RegionOffset, len: u64) -> Result<&mut [u8]> {
        let range = self.range(offset, len)?;
        Ok(&mut self.bytes[range])
    }

    /// Read a little-endian `u32`.
    pub fn read_u32(&self, offset: RegionOffset) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.bytes(offset, 4)?))
    }

    /// Write a little-endian `u32`.
    pub fn write_u32(&mut self, offset: RegionOffset, value: u32) -> Result<()> {
        LittleEndian::write_u32(self.bytes_mut(offset, 4)?, value);
        Ok(())
    }

    /// Read a little-endian `u64`.
    pub fn read_u64(&self, offset: RegionOffset) -> Result<u64> {
        Ok(LittleEndian::read_u64(self.bytes(offset, 8)?))
    }

    /// Write a little-endian `u64`.
    pub fn write_u64(&mut self, offset: RegionOffset, value: u64) -> Result<()> {
        LittleEndian::write_u64(self.bytes_mut(offset, 8)?, value);
        Ok(())
    }

    /// Read a stored offset field.
    pub fn read_offset(&self, offset: RegionOffset) -> Result<RegionOffset> {
        self.read_u64(offset).map(RegionOffset::new)
    }

    /// Write an offset field.
    pub fn write_offset(&mut self, offset: RegionOffset, value: RegionOffset) -> Result<()> {
        self.write_u64(offset, value.as_u64())
    }

    /// Copy `len` bytes from `src` to `dst`; the ranges may overlap.
    pub fn copy_within(&mut self, src: RegionOffset, dst: RegionOffset, len: u64) -> Result<()> {
        let from = self.range(src, len)?;
        let to = self.range(dst, len)?;
        self.bytes.copy_within(from, to.start);
        Ok(())
    }

    /// Set `len` bytes starting at `offset` to `byte`.
    pub fn fill(&mut self, offset: RegionOffset, len: u64, byte: u8) -> Result<()> {
        self.bytes_mut(offset, len)?.fill(byte);
        Ok(())
    }

    /// The whole region as a slice.
    pub fn as_slice(&self) -> &[u8] {
        self.bytes
    }
}
