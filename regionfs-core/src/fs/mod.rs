//! The filesystem handle and its operations.
//!
//! A [`FileSystem`] borrows one region mutably for its whole lifetime, so the
//! compiler guarantees a single writer. Every operation resolves paths from
//! the root, mutates the namespace through the arena allocator and reports
//! failures as [`FsError`](crate::FsError).

mod attr;
mod check;
mod ops;

pub use attr::{DEFAULT_PERMISSIONS, FileAttr, FileKind, FsStats, STATFS_BLOCK_SIZE};
pub use check::CheckReport;

use crate::alloc::Arena;
use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use crate::layout::{INODE_SIZE, Inode, InodeKind, Superblock};
use crate::path::{self, Resolved};
use crate::region::Region;
use crate::types::RegionOffset;

/// A mounted filesystem over one region.
pub struct FileSystem<'r, C: Clock = SystemClock> {
    arena: Arena<'r>,
    clock: C,
}

impl<'r> FileSystem<'r, SystemClock> {
    /// Mount `bytes`, formatting it when it carries no superblock.
    pub fn mount(bytes: &'r mut [u8]) -> Result<Self> {
        Self::mount_with_clock(bytes, SystemClock)
    }
}

impl<'r, C: Clock> FileSystem<'r, C> {
    /// Mount `bytes` with a custom clock.
    pub fn mount_with_clock(bytes: &'r mut [u8], clock: C) -> Result<Self> {
        let arena = Arena::attach(Region::new(bytes))?;
        tracing::debug!(heap_size = arena.heap_size(), "Mounted region");
        Ok(Self { arena, clock })
    }

    /// The allocator behind this filesystem.
    pub fn arena(&self) -> &Arena<'r> {
        &self.arena
    }

    /// The clock used for timestamps.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// The root directory, created on first use.
    fn root(&mut self) -> Result<RegionOffset> {
        let root = Superblock::read_root(self.arena.region())?;
        if !root.is_null() {
            return Ok(root);
        }

        let Some(at) = self.arena.allocate(INODE_SIZE)? else {
            return Err(self.arena.no_space(INODE_SIZE));
        };
        Inode::new("/", InodeKind::Directory, self.clock.now()).store(self.arena.region_mut(), at)?;
        Superblock::write_root(self.arena.region_mut(), at)?;
        tracing::info!(root = %at, "Created root directory");
        Ok(at)
    }

    fn resolve(&mut self, path: &str) -> Result<Resolved> {
        let root = self.root()?;
        path::resolve(&self.arena, root, path)
    }
}
