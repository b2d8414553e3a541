//! Arena allocator living inside the region.
//!
//! The heap that follows the superblock is carved into contiguous spans.
//! Free spans are kept on a singly-linked list sorted by address, anchored in
//! the superblock, so the allocator state travels with the bytes and survives
//! remapping at a different base address.
//!
//! - Allocation is first fit over the whole free list. A block is split when
//!   the remainder can hold a header plus at least one aligned word.
//! - Freeing splices the span back in address order and coalesces it with
//!   byte-adjacent neighbours on both sides.
//! - Reallocation always moves to a fresh span; on failure the old span is
//!   left untouched.

mod report;

pub use report::{AllocatorReport, SpanInfo};

use crate::error::{FsError, Result};
use crate::layout::{ALIGNMENT, SPAN_HEADER_SIZE, SpanHeader, Superblock, span_size_for};
use crate::region::Region;
use crate::types::RegionOffset;

/// The allocator over one region's heap.
pub struct Arena<'r> {
    region: Region<'r>,
    heap_end: RegionOffset,
}

impl<'r> Arena<'r> {
    /// Attach to a region, formatting it first when it carries no superblock.
    pub fn attach(mut region: Region<'r>) -> Result<Self> {
        let superblock = if Superblock::is_formatted(&region)
            .map_err(|_| FsError::bad_region("Region smaller than superblock"))?
        {
            Superblock::load(&region)?
        } else {
            let superblock = Superblock::format_region(&mut region)?;
            tracing::info!(
                region_len = region.len(),
                heap_size = superblock.size,
                "Formatted region"
            );
            superblock
        };

        Ok(Self {
            heap_end: superblock.heap_end(),
            region,
        })
    }

    /// The underlying region.
    pub fn region(&self) -> &Region<'r> {
        &self.region
    }

    /// The underlying region, mutably.
    pub fn region_mut(&mut self) -> &mut Region<'r> {
        &mut self.region
    }

    /// Usable heap bytes.
    pub fn heap_size(&self) -> u64 {
        self.heap_end.as_u64() - Superblock::heap_start().as_u64()
    }

    /// Error for a request of `requested` bytes that found no room.
    pub fn no_space(&self, requested: u64) -> FsError {
        FsError::NoSpace {
            requested,
            available: self.free_bytes().unwrap_or(0),
        }
    }

    /// Allocate `size` payload bytes.
    ///
    /// Returns `None` for a zero-byte request and when no free span is large
    /// enough. The payload is not cleared.
    pub fn allocate(&mut self, size: u64) -> Result<Option<RegionOffset>> {
        if size == 0 {
            return Ok(None);
        }
        let Some(need) = span_size_for(size) else {
            return Ok(None);
        };

        let mut hit = None;
        for entry in self.free_list() {
            let (prev, at, header) = entry?;
            if header.size >= need {
                hit = Some((prev, at, header));
                break;
            }
        }
        let Some((prev, at, header)) = hit else {
            tracing::debug!(requested = size, "No free span large enough");
            return Ok(None);
        };

        let remainder = header.size - need;
        let (taken, successor) = if remainder > SPAN_HEADER_SIZE {
            let tail = RegionOffset::new(at.as_u64() + need);
            SpanHeader {
                size: remainder,
                next: header.next,
            }
            .store(&mut self.region, tail)?;
            (need, tail)
        } else {
            (header.size, header.next)
        };
        self.link(prev, successor)?;
        SpanHeader {
            size: taken,
            next: RegionOffset::NULL,
        }
        .store(&mut self.region, at)?;

        let payload = RegionOffset::new(at.as_u64() + SPAN_HEADER_SIZE);
        tracing::trace!(%payload, requested = size, span = taken, "Allocated");
        Ok(Some(payload))
    }

    /// Return a span to the free list.
    pub fn free(&mut self, payload: RegionOffset) -> Result<()> {
        let (at, header) = self.allocated_header(payload)?;
        let end = at.as_u64() + header.size;

        let mut prev: Option<(RegionOffset, SpanHeader)> = None;
        let mut next = RegionOffset::NULL;
        for entry in self.free_list() {
            let (_, block, block_header) = entry?;
            if block >= at {
                if block.as_u64() < end {
                    return Err(FsError::corrupted(
                        payload,
                        "Span overlaps a free block (double free?)",
                    ));
                }
                next = block;
                break;
            }
            if block.as_u64() + block_header.size > at.as_u64() {
                return Err(FsError::corrupted(
                    payload,
                    "Span lies inside a free block (double free?)",
                ));
            }
            prev = Some((block, block_header));
        }

        // Absorb the following block.
        let mut merged = SpanHeader {
            size: header.size,
            next,
        };
        if !next.is_null() && next.as_u64() == end {
            let following = SpanHeader::load(&self.region, next)?;
            merged.size += following.size;
            merged.next = following.next;
        }

        // Fold into the preceding block.
        match prev {
            Some((block, block_header)) if block.as_u64() + block_header.size == at.as_u64() => {
                SpanHeader {
                    size: block_header.size + merged.size,
                    next: merged.next,
                }
                .store(&mut self.region, block)?;
            }
            Some((block, _)) => {
                merged.store(&mut self.region, at)?;
                self.link(block, at)?;
            }
            None => {
                merged.store(&mut self.region, at)?;
                self.link(RegionOffset::NULL, at)?;
            }
        }

        tracing::trace!(%payload, span = header.size, "Freed");
        Ok(())
    }

    /// Move an allocation to a fresh span of `new_size` bytes.
    ///
    /// A null `payload` behaves as [`Arena::allocate`]; a zero `new_size`
    /// frees the span and returns `None`. The first `min(capacity, new_size)`
    /// bytes are carried over. When no span fits, the original allocation is
    /// left intact and `NoSpace` is returned.
    pub fn reallocate(&mut self, payload: RegionOffset, new_size: u64) -> Result<Option<RegionOffset>> {
        if new_size == 0 {
            if !payload.is_null() {
                self.free(payload)?;
            }
            return Ok(None);
        }
        if payload.is_null() {
            return match self.allocate(new_size)? {
                Some(fresh) => Ok(Some(fresh)),
                None => Err(self.no_space(new_size)),
            };
        }

        let capacity = self.capacity(payload)?;
        let Some(fresh) = self.allocate(new_size)? else {
            return Err(self.no_space(new_size));
        };
        self.region
            .copy_within(payload, fresh, capacity.min(new_size))?;
        self.free(payload)?;
        Ok(Some(fresh))
    }

    /// Shrink an allocation without moving it.
    ///
    /// Used when a shrinking reallocation finds no room for the fresh span.
    /// The tail is split off as a free span when it can hold one.
    pub fn shrink_in_place(&mut self, payload: RegionOffset, new_size: u64) -> Result<()> {
        let (at, header) = self.allocated_header(payload)?;
        let need = span_size_for(new_size.max(ALIGNMENT))
            .ok_or_else(|| FsError::corrupted(payload, "Shrink size overflows"))?;
        if header.size <= need || header.size - need <= SPAN_HEADER_SIZE {
            return Ok(());
        }

        let tail = RegionOffset::new(at.as_u64() + need);
        SpanHeader {
            size: need,
            next: RegionOffset::NULL,
        }
        .store(&mut self.region, at)?;
        SpanHeader {
            size: header.size - need,
            next: RegionOffset::NULL,
        }
        .store(&mut self.region, tail)?;
        self.free(RegionOffset::new(tail.as_u64() + SPAN_HEADER_SIZE))
    }

    /// Payload bytes usable behind `payload`.
    pub fn capacity(&self, payload: RegionOffset) -> Result<u64> {
        self.allocated_header(payload).map(|(_, header)| header.capacity())
    }

    /// Total bytes held by free spans, headers included.
    pub fn free_bytes(&self) -> Result<u64> {
        self.free_list()
            .try_fold(0u64, |sum, entry| Ok(sum + entry?.2.size))
    }

    /// Largest payload a single allocation could currently receive.
    pub fn largest_free(&self) -> Result<u64> {
        self.free_list()
            .try_fold(0u64, |max, entry| Ok(max.max(entry?.2.capacity())))
    }

    fn link(&mut self, prev: RegionOffset, to: RegionOffset) -> Result<()> {
        if prev.is_null() {
            Superblock::write_free_head(&mut self.region, to)
        } else {
            self.region
                .write_offset(RegionOffset::new(prev.as_u64() + 8), to)
        }
    }

    /// Locate and sanity-check the header of an allocated span.
    fn allocated_header(&self, payload: RegionOffset) -> Result<(RegionOffset, SpanHeader)> {
        let heap_start = Superblock::heap_start().as_u64();
        if payload.as_u64() < heap_start + SPAN_HEADER_SIZE
            || payload >= self.heap_end
            || payload.as_u64() % ALIGNMENT != 0
        {
            return Err(FsError::corrupted(payload, "Not a payload offset"));
        }
        let at = RegionOffset::new(payload.as_u64() - SPAN_HEADER_SIZE);
        let header = SpanHeader::load(&self.region, at)?;
        let fits = header
            .end(at)
            .is_some_and(|end| end <= self.heap_end);
        if header.size < SPAN_HEADER_SIZE || header.size % ALIGNMENT != 0 || !fits {
            return Err(FsError::corrupted(
                at,
                format!("Invalid span header (size {})", header.size),
            ));
        }
        Ok((at, header))
    }

    /// Walk the free list in address order.
    pub(crate) fn free_list(&self) -> FreeList<'_, 'r> {
        FreeList {
            arena: self,
            prev: RegionOffset::NULL,
            cursor: Superblock::read_free_head(&self.region),
            budget: self.heap_size() / SPAN_HEADER_SIZE + 1,
        }
    }
}

/// Iterator over free spans yielding `(previous, offset, header)`.
///
/// Refuses to follow links that go backwards, leave the heap or overlap the
/// previous block, so a damaged list cannot loop forever.
pub(crate) struct FreeList<'a, 'r> {
    arena: &'a Arena<'r>,
    prev: RegionOffset,
    cursor: Result<RegionOffset>,
    budget: u64,
}

impl Iterator for FreeList<'_, '_> {
    type Item = Result<(RegionOffset, RegionOffset, SpanHeader)>;

    fn next(&mut self) -> Option<Self::Item> {
        let at = match std::mem::replace(&mut self.cursor, Ok(RegionOffset::NULL)) {
            Ok(at) if at.is_null() => return None,
            Ok(at) => at,
            Err(e) => return Some(Err(e)),
        };
        Some(self.step(at))
    }
}

impl FreeList<'_, '_> {
    fn step(&mut self, at: RegionOffset) -> Result<(RegionOffset, RegionOffset, SpanHeader)> {
        let fail = |cause: &str| Err(FsError::corrupted(at, format!("Free list: {}", cause)));

        if self.budget == 0 {
            return fail("too many blocks");
        }
        self.budget -= 1;
        if at < Superblock::heap_start() || at >= self.arena.heap_end || at.as_u64() % ALIGNMENT != 0 {
            return fail("block outside heap");
        }
        if at <= self.prev {
            return fail("blocks out of address order");
        }

        let header = SpanHeader::load(&self.arena.region, at)?;
        let Some(end) = header.end(at) else {
            return fail("block size overflows");
        };
        if header.size < SPAN_HEADER_SIZE || header.size % ALIGNMENT != 0 || end > self.arena.heap_end {
            return fail("invalid block size");
        }
        if !header.next.is_null() && header.next < end {
            return fail("next block overlaps");
        }

        let prev = self.prev;
        self.prev = at;
        self.cursor = Ok(header.next);
        Ok((prev, at, header))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh(buf: &mut [u8]) -> Arena<'_> {
        Arena::attach(Region::new(buf)).unwrap()
    }

    #[test]
    fn attach_formats_zeroed_region() {
        let mut buf = vec![0u8; 4096];
        let arena = fresh(&mut buf);
        assert_eq!(arena.heap_size(), 4096 - 32);
        assert_eq!(arena.free_bytes().unwrap(), arena.heap_size());
        assert_eq!(arena.largest_free().unwrap(), arena.heap_size() - 16);
    }

    #[test]
    fn attach_rejects_tiny_region() {
        let mut buf = vec![0u8; 1024];
        let err = Arena::attach(Region::new(&mut buf)).err().unwrap();
        assert_eq!(err.code(), "E201");
    }

    #[test]
    fn allocation_rounds_and_aligns() {
        let mut buf = vec![0u8; 4096];
        let mut arena = fresh(&mut buf);

        assert_eq!(arena.allocate(0).unwrap(), None);
        let a = arena.allocate(5).unwrap().unwrap();
        let b = arena.allocate(9).unwrap().unwrap();
        assert_eq!(a.as_u64() % 8, 0);
        assert_eq!(a, RegionOffset::new(32 + 16));
        assert_eq!(b, RegionOffset::new(32 + 24 + 16));
        assert_eq!(arena.capacity(a).unwrap(), 8);
        assert_eq!(arena.capacity(b).unwrap(), 16);
    }

    #[test]
    fn free_coalesces_both_neighbours() {
        let mut buf = vec![0u8; 4096];
        let mut arena = fresh(&mut buf);
        let total = arena.free_bytes().unwrap();

        let a = arena.allocate(64).unwrap().unwrap();
        let b = arena.allocate(64).unwrap().unwrap();
        let c = arena.allocate(64).unwrap().unwrap();

        arena.free(a).unwrap();
        arena.free(c).unwrap();
        assert_eq!(arena.free_list().count(), 2);

        arena.free(b).unwrap();
        assert_eq!(arena.free_list().count(), 1);
        assert_eq!(arena.free_bytes().unwrap(), total);
    }

    #[test]
    fn first_fit_reaches_the_last_block() {
        let mut buf = vec![0u8; 2048];
        let mut arena = fresh(&mut buf);

        let a = arena.allocate(64).unwrap().unwrap();
        let _pin = arena.allocate(8).unwrap().unwrap();
        arena.free(a).unwrap();

        // Only the terminal block can hold this.
        let big = arena.allocate(512).unwrap();
        assert!(big.is_some());
        assert!(big.unwrap() > a);
    }

    #[test]
    fn small_remainder_is_absorbed() {
        let mut buf = vec![0u8; 2048];
        let mut arena = fresh(&mut buf);
        let heap = arena.heap_size();

        // Leaves exactly 16 bytes behind, which cannot hold a block.
        let whole = arena.allocate(heap - 32).unwrap().unwrap();
        assert_eq!(arena.capacity(whole).unwrap(), heap - 16);
        assert_eq!(arena.free_bytes().unwrap(), 0);
        assert_eq!(arena.allocate(1).unwrap(), None);
    }

    #[test]
    fn double_free_is_detected() {
        let mut buf = vec![0u8; 2048];
        let mut arena = fresh(&mut buf);
        let a = arena.allocate(32).unwrap().unwrap();
        let _b = arena.allocate(32).unwrap().unwrap();
        arena.free(a).unwrap();
        assert_eq!(arena.free(a).unwrap_err().code(), "E202");
        assert!(arena.free(RegionOffset::new(3)).is_err());
    }

    #[test]
    fn reallocate_moves_and_preserves_bytes() {
        let mut buf = vec![0u8; 4096];
        let mut arena = fresh(&mut buf);

        let a = arena.allocate(16).unwrap().unwrap();
        arena
            .region_mut()
            .bytes_mut(a, 16)
            .unwrap()
            .copy_from_slice(b"0123456789abcdef");

        let b = arena.reallocate(a, 64).unwrap().unwrap();
        assert_ne!(a, b);
        assert_eq!(arena.region().bytes(b, 16).unwrap(), b"0123456789abcdef");

        let c = arena.reallocate(b, 4).unwrap().unwrap();
        assert_eq!(arena.region().bytes(c, 4).unwrap(), b"0123");

        assert_eq!(arena.reallocate(c, 0).unwrap(), None);
        assert_eq!(arena.free_bytes().unwrap(), arena.heap_size());

        let d = arena.reallocate(RegionOffset::NULL, 8).unwrap();
        assert!(d.is_some());
    }

    #[test]
    fn failed_reallocate_keeps_original() {
        let mut buf = vec![0u8; 2048];
        let mut arena = fresh(&mut buf);
        let a = arena.allocate(1024).unwrap().unwrap();
        arena.region_mut().fill(a, 1024, 0xab).unwrap();

        let err = arena.reallocate(a, 1500).unwrap_err();
        assert_eq!(err.code(), "E101");
        assert_eq!(arena.capacity(a).unwrap(), 1024);
        assert!(arena.region().bytes(a, 1024).unwrap().iter().all(|b| *b == 0xab));
    }

    #[test]
    fn shrink_in_place_releases_tail() {
        let mut buf = vec![0u8; 2048];
        let mut arena = fresh(&mut buf);
        let heap = arena.heap_size();
        let a = arena.allocate(heap - 16).unwrap().unwrap();
        assert_eq!(arena.free_bytes().unwrap(), 0);

        arena.shrink_in_place(a, 100).unwrap();
        assert_eq!(arena.capacity(a).unwrap(), 104);
        assert_eq!(arena.free_bytes().unwrap(), heap - 120);
    }

    #[test]
    fn state_survives_relocation() {
        let mut first = vec![0u8; 2048];
        let kept = {
            let mut arena = fresh(&mut first);
            let kept = arena.allocate(40).unwrap().unwrap();
            let dropped = arena.allocate(40).unwrap().unwrap();
            arena.free(dropped).unwrap();
            kept
        };

        let mut moved = first.clone();
        let arena = fresh(&mut moved);
        assert_eq!(arena.capacity(kept).unwrap(), 40);
        assert_eq!(arena.free_bytes().unwrap(), arena.heap_size() - 56);
    }

    #[test]
    fn looping_free_list_is_reported() {
        let mut buf = vec![0u8; 2048];
        let mut arena = fresh(&mut buf);
        let a = arena.allocate(32).unwrap().unwrap();
        let _b = arena.allocate(32).unwrap().unwrap();
        arena.free(a).unwrap();

        // Point the first free block back at itself.
        let head = Superblock::read_free_head(arena.region()).unwrap();
        arena
            .region_mut()
            .write_offset(RegionOffset::new(head.as_u64() + 8), head)
            .unwrap();
        assert!(arena.free_bytes().is_err());
        assert!(arena.allocate(4096).is_err());
    }
}
