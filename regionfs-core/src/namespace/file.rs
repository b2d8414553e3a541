//! File block chains.
//!
//! A file's content is a singly-linked chain of [`FileBlock`] records, each
//! owning a separate data allocation. Writes past the end append a new
//! zero-filled block covering the gap; truncation resizes the boundary block
//! and releases everything after it.

use super::file_payload;
use crate::alloc::Arena;
use crate::error::{FsError, Result};
use crate::layout::{FILE_BLOCK_SIZE, FileBlock, Inode, InodeData, SPAN_HEADER_SIZE};
use crate::types::RegionOffset;

/// Collect the chain starting at `first` as `(record, block)` pairs.
pub fn blocks(arena: &Arena<'_>, first: RegionOffset) -> Result<Vec<(RegionOffset, FileBlock)>> {
    let mut budget = arena.heap_size() / (FILE_BLOCK_SIZE + SPAN_HEADER_SIZE);
    let mut chain = Vec::new();
    let mut total = 0u64;
    let mut cursor = first;
    while !cursor.is_null() {
        if budget == 0 {
            return Err(FsError::corrupted(cursor, "Block chain does not terminate"));
        }
        budget -= 1;
        let block = FileBlock::load(arena.region(), cursor)?;
        if block.block_size == 0 {
            return Err(FsError::corrupted(cursor, "Empty file block"));
        }
        let data_end = block.data.as_u64().checked_add(block.block_size);
        if data_end.is_none_or(|end| end > arena.region().len()) {
            return Err(FsError::corrupted(cursor, "Block data runs past region end"));
        }
        total = total
            .checked_add(block.block_size)
            .ok_or_else(|| FsError::corrupted(cursor, "Block size overflows"))?;
        chain.push((cursor, block));
        cursor = block.next;
    }
    Ok(chain)
}

/// End position of `block` when it starts at file position `pos`.
fn end_of(pos: u64, record: RegionOffset, block: &FileBlock) -> Result<u64> {
    pos.checked_add(block.block_size)
        .ok_or_else(|| FsError::corrupted(record, "Block size overflows"))
}

/// Region offset of file position `from` inside `block`, which starts at `pos`.
fn data_at(pos: u64, from: u64, record: RegionOffset, block: &FileBlock) -> Result<RegionOffset> {
    block
        .data
        .checked_add(from - pos)
        .ok_or_else(|| FsError::corrupted(record, "Block data offset overflows"))
}

fn set_size(arena: &mut Arena<'_>, at: RegionOffset, size: u64, first: RegionOffset) -> Result<()> {
    Inode::store_data(
        arena.region_mut(),
        at,
        InodeData::File {
            size,
            first_block: first,
        },
    )
}

/// Append a zero-filled block of `len` bytes after `tail` (or as the first
/// block when `tail` is null) and return its record offset.
fn append_block(arena: &mut Arena<'_>, tail: RegionOffset, len: u64) -> Result<RegionOffset> {
    let Some(record) = arena.allocate(FILE_BLOCK_SIZE)? else {
        return Err(arena.no_space(FILE_BLOCK_SIZE));
    };
    let Some(data) = arena.allocate(len)? else {
        tracing::warn!(requested = len, "No room for block data, releasing block record");
        arena.free(record)?;
        return Err(arena.no_space(len));
    };
    arena.region_mut().fill(data, len, 0)?;
    FileBlock {
        block_size: len,
        next: RegionOffset::NULL,
        data,
    }
    .store(arena.region_mut(), record)?;
    if !tail.is_null() {
        FileBlock::set_next(arena.region_mut(), tail, record)?;
    }
    Ok(record)
}

/// Copy up to `buf.len()` bytes starting at `offset` into `buf`.
///
/// Returns the number of bytes copied; zero at or past the end of the file.
pub fn read(arena: &Arena<'_>, at: RegionOffset, buf: &mut [u8], offset: u64) -> Result<usize> {
    let (size, first) = file_payload(arena, at)?;
    if offset >= size || buf.is_empty() {
        return Ok(0);
    }
    let len = (size - offset).min(buf.len() as u64);
    let end = offset + len;

    let mut pos = 0u64;
    for (record, block) in blocks(arena, first)? {
        let block_end = end_of(pos, record, &block)?;
        if block_end > offset {
            let from = offset.max(pos);
            let to = end.min(block_end);
            let src = arena
                .region()
                .bytes(data_at(pos, from, record, &block)?, to - from)?;
            buf[(from - offset) as usize..(to - offset) as usize].copy_from_slice(src);
        }
        pos = block_end;
        if pos >= end {
            break;
        }
    }
    if pos < end {
        return Err(FsError::corrupted(at, "Block chain shorter than file size"));
    }
    Ok(len as usize)
}

/// Write all of `data` at `offset`, extending the file when needed.
pub fn write(arena: &mut Arena<'_>, at: RegionOffset, data: &[u8], offset: u64) -> Result<usize> {
    if data.is_empty() {
        return Ok(0);
    }
    let (size, mut first) = file_payload(arena, at)?;
    let end = offset
        .checked_add(data.len() as u64)
        .ok_or_else(|| FsError::FileTooLarge {
            path: format!("inode at {}", at),
        })?;

    if end > size {
        let tail = blocks(arena, first)?
            .last()
            .map_or(RegionOffset::NULL, |(record, _)| *record);
        let record = append_block(arena, tail, end - size)?;
        if first.is_null() {
            first = record;
        }
        set_size(arena, at, end, first)?;
    }

    let mut pos = 0u64;
    for (record, block) in blocks(arena, first)? {
        let block_end = end_of(pos, record, &block)?;
        if block_end > offset {
            let from = offset.max(pos);
            let to = end.min(block_end);
            let dst = data_at(pos, from, record, &block)?;
            arena
                .region_mut()
                .bytes_mut(dst, to - from)?
                .copy_from_slice(&data[(from - offset) as usize..(to - offset) as usize]);
        }
        pos = block_end;
        if pos >= end {
            break;
        }
    }
    if pos < end {
        return Err(FsError::corrupted(at, "Block chain shorter than file size"));
    }
    Ok(data.len())
}

/// Set the file length to `new_size`, zero-filling when growing.
pub fn truncate(arena: &mut Arena<'_>, at: RegionOffset, new_size: u64) -> Result<()> {
    let (size, first) = file_payload(arena, at)?;
    if new_size == size {
        return Ok(());
    }
    if new_size == 0 {
        set_size(arena, at, 0, RegionOffset::NULL)?;
        return release(arena, first);
    }

    let chain = blocks(arena, first)?;
    if new_size > size {
        let Some(&(record, block)) = chain.last() else {
            let record = append_block(arena, RegionOffset::NULL, new_size)?;
            return set_size(arena, at, new_size, record);
        };
        let grown = block
            .block_size
            .checked_add(new_size - size)
            .ok_or_else(|| FsError::FileTooLarge {
                path: format!("inode at {}", at),
            })?;
        let data = arena
            .reallocate(block.data, grown)?
            .ok_or_else(|| FsError::corrupted(record, "Block data vanished"))?;
        let gap = data
            .checked_add(block.block_size)
            .ok_or_else(|| FsError::corrupted(record, "Block data offset overflows"))?;
        arena.region_mut().fill(gap, grown - block.block_size, 0)?;
        FileBlock {
            block_size: grown,
            data,
            ..block
        }
        .store(arena.region_mut(), record)?;
        return set_size(arena, at, new_size, first);
    }

    // Shrink: find the block holding the new last byte.
    let mut pos = 0u64;
    for (record, block) in chain {
        let end = end_of(pos, record, &block)?;
        if end < new_size {
            pos = end;
            continue;
        }
        let keep = new_size - pos;
        let data = if keep < block.block_size {
            match arena.reallocate(block.data, keep) {
                Ok(Some(data)) => data,
                Ok(None) => return Err(FsError::corrupted(record, "Block data vanished")),
                Err(e) if e.is_space_error() => {
                    tracing::warn!(block = %record, keep, "No room to move block data, shrinking in place");
                    arena.shrink_in_place(block.data, keep)?;
                    block.data
                }
                Err(e) => return Err(e),
            }
        } else {
            block.data
        };
        FileBlock {
            block_size: keep,
            next: RegionOffset::NULL,
            data,
        }
        .store(arena.region_mut(), record)?;
        set_size(arena, at, new_size, first)?;
        return release(arena, block.next);
    }
    Err(FsError::corrupted(at, "Block chain shorter than file size"))
}

/// Free every block record and data allocation in the chain at `first`.
pub fn release(arena: &mut Arena<'_>, first: RegionOffset) -> Result<()> {
    for (record, block) in blocks(arena, first)? {
        arena.free(block.data)?;
        arena.free(record)?;
    }
    Ok(())
}
