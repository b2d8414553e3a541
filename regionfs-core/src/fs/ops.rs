//! The thirteen filesystem operations.

use super::{DEFAULT_PERMISSIONS, FileAttr, FileKind, FileSystem, FsStats, STATFS_BLOCK_SIZE};
use crate::clock::Clock;
use crate::error::{FsError, Result};
use crate::layout::{Inode, InodeData, InodeKind, NAME_MAX};
use crate::namespace::{dir, file};
use crate::path::{self, Resolved};
use crate::types::Timespec;

/// Largest file length representable as a signed `off_t`.
const MAX_FILE_SIZE: u64 = i64::MAX as u64;

impl<C: Clock> FileSystem<'_, C> {
    fn resolve_dir(&mut self, path: &str) -> Result<Resolved> {
        let resolved = self.resolve(path)?;
        if !resolved.inode.is_dir() {
            return Err(FsError::NotADirectory {
                path: path.to_string(),
            });
        }
        Ok(resolved)
    }

    fn resolve_file(&mut self, path: &str) -> Result<Resolved> {
        let resolved = self.resolve(path)?;
        if resolved.inode.is_dir() {
            return Err(FsError::IsADirectory {
                path: path.to_string(),
            });
        }
        Ok(resolved)
    }

    /// Attributes of the entry at `path`; `uid` and `gid` are echoed back.
    pub fn getattr(&mut self, path: &str, uid: u32, gid: u32) -> Result<FileAttr> {
        tracing::debug!(path, "getattr");
        let Resolved { at, inode, .. } = self.resolve(path)?;

        let (kind, nlink, size) = match inode.data {
            InodeData::Directory { .. } => {
                let subdirs = dir::entries(&self.arena, at)?
                    .iter()
                    .filter(|entry| entry.inode.is_dir())
                    .count() as u64;
                (FileKind::Directory, 2 + subdirs, 0)
            }
            InodeData::File { size, .. } => (FileKind::RegularFile, 1, size),
        };

        Ok(FileAttr {
            kind,
            mode: kind.type_bits() | DEFAULT_PERMISSIONS,
            nlink,
            size,
            uid,
            gid,
            atime: inode.atime,
            mtime: inode.mtime,
        })
    }

    /// Names of the direct children of the directory at `path`.
    pub fn readdir(&mut self, path: &str) -> Result<Vec<String>> {
        tracing::debug!(path, "readdir");
        let resolved = self.resolve_dir(path)?;
        dir::names(&self.arena, resolved.at)
    }

    /// Create an empty regular file.
    pub fn mknod(&mut self, path: &str) -> Result<()> {
        tracing::debug!(path, "mknod");
        self.create(path, InodeKind::File)
    }

    /// Create an empty directory.
    pub fn mkdir(&mut self, path: &str) -> Result<()> {
        tracing::debug!(path, "mkdir");
        self.create(path, InodeKind::Directory)
    }

    fn create(&mut self, path: &str, kind: InodeKind) -> Result<()> {
        if path::components(path)?.is_empty() {
            return Err(FsError::AlreadyExists {
                path: path.to_string(),
            });
        }
        let (parent_path, name) = path::split_parent(path)?;
        path::validate_name(name)?;

        let parent = self.resolve_dir(&parent_path)?;
        if dir::lookup(&self.arena, parent.at, name)?.is_some() {
            return Err(FsError::AlreadyExists {
                path: path.to_string(),
            });
        }

        let now = self.clock.now();
        dir::insert(&mut self.arena, parent.at, &Inode::new(name, kind, now), now)
            .inspect_err(|e| {
                if e.is_space_error() {
                    tracing::warn!(path, "No space to create entry");
                }
            })?;
        Ok(())
    }

    /// Remove a regular file and release its data.
    pub fn unlink(&mut self, path: &str) -> Result<()> {
        tracing::debug!(path, "unlink");
        let target = self.resolve_file(path)?;
        let (parent_path, _) = path::split_parent(path)?;
        let parent = self.resolve(&parent_path)?;

        let index = target
            .index
            .ok_or_else(|| FsError::corrupted(target.at, "File without a parent slot"))?;
        let removed = dir::remove(&mut self.arena, parent.at, index, self.clock.now())?;
        if let InodeData::File { first_block, .. } = removed.data {
            file::release(&mut self.arena, first_block)?;
        }
        Ok(())
    }

    /// Remove an empty directory.
    pub fn rmdir(&mut self, path: &str) -> Result<()> {
        tracing::debug!(path, "rmdir");
        let target = self.resolve_dir(path)?;
        let Some(index) = target.index else {
            return Err(FsError::Busy {
                path: path.to_string(),
            });
        };
        if matches!(target.inode.data, InodeData::Directory { num_children, .. } if num_children > 0) {
            return Err(FsError::NotEmpty {
                path: path.to_string(),
            });
        }

        let (parent_path, _) = path::split_parent(path)?;
        let parent = self.resolve(&parent_path)?;
        dir::remove(&mut self.arena, parent.at, index, self.clock.now())?;
        Ok(())
    }

    /// Move the entry at `from` to `to`, replacing a compatible destination.
    pub fn rename(&mut self, from: &str, to: &str) -> Result<()> {
        tracing::debug!(from, to, "rename");
        let source = self.resolve(from)?;
        if path::normalize(from)? == path::normalize(to)? {
            return Ok(());
        }
        if source.index.is_none() {
            return Err(FsError::Busy {
                path: from.to_string(),
            });
        }
        if path::components(to)?.is_empty() {
            return Err(FsError::Busy {
                path: to.to_string(),
            });
        }
        if source.inode.is_dir() && path::is_descendant(to, from)? {
            return Err(FsError::invalid_path(
                to,
                "cannot move a directory into itself",
            ));
        }

        let (from_parent, from_name) = path::split_parent(from)?;
        let (to_parent, to_name) = path::split_parent(to)?;
        path::validate_name(to_name)?;
        let destination_dir = self.resolve_dir(&to_parent)?;

        let mut moved = source.inode.clone();
        moved.name = to_name.to_string();
        let now = self.clock.now();

        let replaced = match dir::lookup(&self.arena, destination_dir.at, to_name)? {
            Some(existing) => {
                match (&moved.data, &existing.inode.data) {
                    (InodeData::File { .. }, InodeData::Directory { .. }) => {
                        return Err(FsError::IsADirectory {
                            path: to.to_string(),
                        });
                    }
                    (InodeData::Directory { .. }, InodeData::File { .. }) => {
                        return Err(FsError::NotADirectory {
                            path: to.to_string(),
                        });
                    }
                    (_, InodeData::Directory { num_children, .. }) if *num_children > 0 => {
                        return Err(FsError::NotEmpty {
                            path: to.to_string(),
                        });
                    }
                    _ => {}
                }
                // Overwrite the destination record in place; no allocation.
                moved.store(self.arena.region_mut(), existing.at)?;
                Inode::store_mtime(self.arena.region_mut(), destination_dir.at, now)?;
                Some(existing.inode)
            }
            None => {
                dir::insert(&mut self.arena, destination_dir.at, &moved, now)?;
                None
            }
        };

        // The insert may have moved the source's parent record.
        let source_dir = self.resolve(&from_parent)?;
        let entry = dir::lookup(&self.arena, source_dir.at, from_name)?
            .ok_or_else(|| FsError::not_found(from))?;
        dir::remove(&mut self.arena, source_dir.at, entry.index, now)?;

        if let Some(old) = replaced {
            tracing::debug!(to, "Replaced existing destination");
            match old.data {
                InodeData::File { first_block, .. } => file::release(&mut self.arena, first_block)?,
                InodeData::Directory { children, .. } if !children.is_null() => {
                    self.arena.free(children)?
                }
                InodeData::Directory { .. } => {}
            }
        }
        Ok(())
    }

    /// Set the length of the file at `path`, zero-filling when growing.
    pub fn truncate(&mut self, path: &str, len: u64) -> Result<()> {
        tracing::debug!(path, len, "truncate");
        if len > MAX_FILE_SIZE {
            return Err(FsError::FileTooLarge {
                path: path.to_string(),
            });
        }
        let target = self.resolve_file(path)?;
        file::truncate(&mut self.arena, target.at, len).inspect_err(|e| {
            if e.is_space_error() {
                tracing::warn!(path, len, "No space to grow file");
            }
        })?;
        Inode::store_mtime(self.arena.region_mut(), target.at, self.clock.now())
    }

    /// Check that `path` exists.
    pub fn open(&mut self, path: &str) -> Result<()> {
        tracing::debug!(path, "open");
        self.resolve(path).map(|_| ())
    }

    /// Read into `buf` from `offset`; returns the number of bytes copied.
    pub fn read(&mut self, path: &str, buf: &mut [u8], offset: u64) -> Result<usize> {
        tracing::debug!(path, len = buf.len(), offset, "read");
        let target = self.resolve_file(path)?;
        file::read(&self.arena, target.at, buf, offset)
    }

    /// Write all of `buf` at `offset`; returns the number of bytes written.
    pub fn write(&mut self, path: &str, buf: &[u8], offset: u64) -> Result<usize> {
        tracing::debug!(path, len = buf.len(), offset, "write");
        let end = offset
            .checked_add(buf.len() as u64)
            .filter(|end| *end <= MAX_FILE_SIZE)
            .ok_or_else(|| FsError::FileTooLarge {
                path: path.to_string(),
            })?;
        let target = self.resolve_file(path)?;
        let written = file::write(&mut self.arena, target.at, buf, offset).inspect_err(|e| {
            if e.is_space_error() {
                tracing::warn!(path, end, "No space to extend file");
            }
        })?;
        Inode::store_mtime(self.arena.region_mut(), target.at, self.clock.now())?;
        Ok(written)
    }

    /// Set both timestamps of the entry at `path`.
    pub fn utimens(&mut self, path: &str, atime: Timespec, mtime: Timespec) -> Result<()> {
        tracing::debug!(path, %atime, %mtime, "utimens");
        let target = self.resolve(path)?;
        Inode::store_times(self.arena.region_mut(), target.at, atime, mtime)
    }

    /// Set both timestamps of the entry at `path` to the mount clock's now.
    pub fn touch(&mut self, path: &str) -> Result<()> {
        let now = self.clock.now();
        self.utimens(path, now, now)
    }

    /// Filesystem-wide statistics.
    pub fn statfs(&mut self) -> Result<FsStats> {
        let free = self.arena.free_bytes()?;
        let blocks_free = free / STATFS_BLOCK_SIZE;
        Ok(FsStats {
            block_size: STATFS_BLOCK_SIZE,
            blocks: self.arena.heap_size() / STATFS_BLOCK_SIZE,
            blocks_free,
            blocks_available: blocks_free,
            name_max: NAME_MAX as u64,
        })
    }
}
