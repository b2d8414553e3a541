//! Namespace store: directory child arrays and file block chains.
//!
//! These functions operate on inode records by offset and know nothing about
//! paths. Any call that resizes a child array may move every record in it,
//! so offsets of children must be re-resolved afterwards.

pub mod dir;
pub mod file;

use crate::alloc::Arena;
use crate::error::{FsError, Result};
use crate::layout::{Inode, InodeData};
use crate::types::RegionOffset;

/// Read the payload of a directory inode as `(num_children, children)`.
pub(crate) fn dir_payload(arena: &Arena<'_>, at: RegionOffset) -> Result<(u64, RegionOffset)> {
    match Inode::load(arena.region(), at)?.data {
        InodeData::Directory {
            num_children,
            children,
        } => Ok((num_children, children)),
        InodeData::File { .. } => Err(FsError::corrupted(at, "Expected a directory inode")),
    }
}

/// Read the payload of a file inode as `(size, first_block)`.
pub(crate) fn file_payload(arena: &Arena<'_>, at: RegionOffset) -> Result<(u64, RegionOffset)> {
    match Inode::load(arena.region(), at)?.data {
        InodeData::File { size, first_block } => Ok((size, first_block)),
        InodeData::Directory { .. } => Err(FsError::corrupted(at, "Expected a file inode")),
    }
}
