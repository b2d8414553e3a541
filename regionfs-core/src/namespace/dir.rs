//! Directory child arrays.
//!
//! A directory's children are full inode records packed in one allocation.
//! Removal swaps the last record into the hole, so sibling order is not
//! stable.

use super::dir_payload;
use crate::alloc::Arena;
use crate::error::{FsError, Result};
use crate::layout::{INODE_SIZE, Inode, InodeData};
use crate::types::{RegionOffset, Timespec};

/// A child record found in a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Position in the child array.
    pub index: u64,
    /// Offset of the record.
    pub at: RegionOffset,
    /// The decoded record.
    pub inode: Inode,
}

fn slot(children: RegionOffset, index: u64) -> RegionOffset {
    RegionOffset::new(children.as_u64() + index * INODE_SIZE)
}

fn array_len(dir_at: RegionOffset, count: u64) -> Result<u64> {
    count
        .checked_mul(INODE_SIZE)
        .ok_or_else(|| FsError::corrupted(dir_at, format!("Child count {} overflows", count)))
}

/// Every child of the directory at `dir_at`, in array order.
pub fn entries(arena: &Arena<'_>, dir_at: RegionOffset) -> Result<Vec<Entry>> {
    let (count, children) = dir_payload(arena, dir_at)?;
    if count == 0 {
        return Ok(Vec::new());
    }
    // Bound the count by the bytes actually available before trusting it.
    let capacity = arena.capacity(children)?;
    if array_len(dir_at, count)? > capacity {
        return Err(FsError::corrupted(
            dir_at,
            format!("{} children do not fit a {} byte array", count, capacity),
        ));
    }

    let mut out = Vec::new();
    out.try_reserve(count as usize)
        .map_err(|e| FsError::OutOfMemory {
            cause: e.to_string(),
        })?;
    for index in 0..count {
        let at = slot(children, index);
        out.push(Entry {
            index,
            at,
            inode: Inode::load(arena.region(), at)?,
        });
    }
    Ok(out)
}

/// Find the child called `name`.
pub fn lookup(arena: &Arena<'_>, dir_at: RegionOffset, name: &str) -> Result<Option<Entry>> {
    Ok(entries(arena, dir_at)?
        .into_iter()
        .find(|entry| entry.inode.name == name))
}

/// Names of every child, for directory listings.
pub fn names(arena: &Arena<'_>, dir_at: RegionOffset) -> Result<Vec<String>> {
    let entries = entries(arena, dir_at)?;
    let mut names = Vec::new();
    names
        .try_reserve_exact(entries.len())
        .map_err(|e| FsError::OutOfMemory {
            cause: e.to_string(),
        })?;
    names.extend(entries.into_iter().map(|entry| entry.inode.name));
    Ok(names)
}

/// Append `inode` to the directory at `dir_at` and return the new record's
/// offset.
///
/// The array grows through reallocation, so on `NoSpace` nothing changed.
pub fn insert(
    arena: &mut Arena<'_>,
    dir_at: RegionOffset,
    inode: &Inode,
    now: Timespec,
) -> Result<RegionOffset> {
    let record = inode
        .to_bytes()
        .map_err(|e| FsError::corrupted(dir_at, e.to_string()))?;
    let (count, children) = dir_payload(arena, dir_at)?;
    let grown_count = count
        .checked_add(1)
        .ok_or_else(|| FsError::corrupted(dir_at, "Child count overflows"))?;
    let grown = array_len(dir_at, grown_count)?;

    let array = arena
        .reallocate(children, grown)?
        .ok_or_else(|| FsError::corrupted(dir_at, "Child array vanished"))?;
    let at = slot(array, count);
    arena
        .region_mut()
        .bytes_mut(at, INODE_SIZE)?
        .copy_from_slice(&record);
    Inode::store_data(
        arena.region_mut(),
        dir_at,
        InodeData::Directory {
            num_children: grown_count,
            children: array,
        },
    )?;
    Inode::store_mtime(arena.region_mut(), dir_at, now)?;

    tracing::trace!(dir = %dir_at, name = %inode.name, children = grown_count, "Inserted child");
    Ok(at)
}

/// Remove the child at `index` and return its record.
///
/// The caller is responsible for releasing whatever the record owned.
pub fn remove(
    arena: &mut Arena<'_>,
    dir_at: RegionOffset,
    index: u64,
    now: Timespec,
) -> Result<Inode> {
    let (count, children) = dir_payload(arena, dir_at)?;
    if index >= count {
        return Err(FsError::corrupted(
            dir_at,
            format!("Child index {} out of {}", index, count),
        ));
    }

    let removed = Inode::load(arena.region(), slot(children, index))?;
    let last = count - 1;
    if index != last {
        arena
            .region_mut()
            .copy_within(slot(children, last), slot(children, index), INODE_SIZE)?;
    }

    let array = if last == 0 {
        arena.free(children)?;
        RegionOffset::NULL
    } else {
        let shrunk = array_len(dir_at, last)?;
        match arena.reallocate(children, shrunk) {
            Ok(Some(array)) => array,
            Ok(None) => return Err(FsError::corrupted(dir_at, "Child array vanished")),
            Err(e) if e.is_space_error() => {
                tracing::warn!(dir = %dir_at, children = last, "No room to move child array, shrinking in place");
                arena.shrink_in_place(children, shrunk)?;
                children
            }
            Err(e) => return Err(e),
        }
    };
    Inode::store_data(
        arena.region_mut(),
        dir_at,
        InodeData::Directory {
            num_children: last,
            children: array,
        },
    )?;
    Inode::store_mtime(arena.region_mut(), dir_at, now)?;

    tracing::trace!(dir = %dir_at, name = %removed.name, children = last, "Removed child");
    Ok(removed)
}
