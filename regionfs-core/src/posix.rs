//! POSIX-style entry points.
//!
//! Each function mounts the region, runs one operation and reports the
//! outcome the way a FUSE callback does: `0` (or a byte count) on success,
//! `-1` with the error number stored in `errno` on failure. `errno` is left
//! untouched on success.

use crate::error::{FsError, Result};
use crate::fs::{FileAttr, FileSystem, FsStats};
use crate::types::Timespec;

fn run<T>(
    region: &mut [u8],
    errno: &mut i32,
    op: &str,
    f: impl FnOnce(&mut FileSystem<'_>) -> Result<T>,
) -> Option<T> {
    match FileSystem::mount(region).and_then(|mut fs| f(&mut fs)) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!(op, code = e.code(), errno = e.errno(), error = %e, "Operation failed");
            *errno = e.errno();
            None
        }
    }
}

fn status(result: Option<()>) -> i32 {
    if result.is_some() { 0 } else { -1 }
}

fn offset_arg(offset: i64) -> Result<u64> {
    u64::try_from(offset).map_err(|_| FsError::invalid_path("", format!("negative offset {}", offset)))
}

/// Fill `attr` with the attributes of `path`.
pub fn getattr(
    region: &mut [u8],
    errno: &mut i32,
    path: &str,
    uid: u32,
    gid: u32,
    attr: &mut FileAttr,
) -> i32 {
    status(run(region, errno, "getattr", |fs| {
        *attr = fs.getattr(path, uid, gid)?;
        Ok(())
    }))
}

/// Replace `names` with the children of the directory at `path`.
pub fn readdir(region: &mut [u8], errno: &mut i32, path: &str, names: &mut Vec<String>) -> i32 {
    status(run(region, errno, "readdir", |fs| {
        *names = fs.readdir(path)?;
        Ok(())
    }))
}

/// Create an empty regular file.
pub fn mknod(region: &mut [u8], errno: &mut i32, path: &str) -> i32 {
    status(run(region, errno, "mknod", |fs| fs.mknod(path)))
}

/// Create an empty directory.
pub fn mkdir(region: &mut [u8], errno: &mut i32, path: &str) -> i32 {
    status(run(region, errno, "mkdir", |fs| fs.mkdir(path)))
}

/// Remove a regular file.
pub fn unlink(region: &mut [u8], errno: &mut i32, path: &str) -> i32 {
    status(run(region, errno, "unlink", |fs| fs.unlink(path)))
}

/// Remove an empty directory.
pub fn rmdir(region: &mut [u8], errno: &mut i32, path: &str) -> i32 {
    status(run(region, errno, "rmdir", |fs| fs.rmdir(path)))
}

/// Move `from` to `to`.
pub fn rename(region: &mut [u8], errno: &mut i32, from: &str, to: &str) -> i32 {
    status(run(region, errno, "rename", |fs| fs.rename(from, to)))
}

/// Set the length of a file; a negative length is `EINVAL`.
pub fn truncate(region: &mut [u8], errno: &mut i32, path: &str, len: i64) -> i32 {
    status(run(region, errno, "truncate", |fs| {
        fs.truncate(path, offset_arg(len)?)
    }))
}

/// Check that `path` exists.
pub fn open(region: &mut [u8], errno: &mut i32, path: &str) -> i32 {
    status(run(region, errno, "open", |fs| fs.open(path)))
}

/// Read into `buf` from `offset`; returns the byte count or `-1`.
pub fn read(region: &mut [u8], errno: &mut i32, path: &str, buf: &mut [u8], offset: i64) -> isize {
    run(region, errno, "read", |fs| fs.read(path, buf, offset_arg(offset)?))
        .map_or(-1, |n| n as isize)
}

/// Write `buf` at `offset`; returns the byte count or `-1`.
pub fn write(region: &mut [u8], errno: &mut i32, path: &str, buf: &[u8], offset: i64) -> isize {
    run(region, errno, "write", |fs| fs.write(path, buf, offset_arg(offset)?))
        .map_or(-1, |n| n as isize)
}

/// Set access and modification times, in that order.
pub fn utimens(region: &mut [u8], errno: &mut i32, path: &str, times: [Timespec; 2]) -> i32 {
    status(run(region, errno, "utimens", |fs| fs.utimens(path, times[0], times[1])))
}

/// Fill `stats` with filesystem statistics.
pub fn statfs(region: &mut [u8], errno: &mut i32, stats: &mut FsStats) -> i32 {
    status(run(region, errno, "statfs", |fs| {
        *stats = fs.statfs()?;
        Ok(())
    }))
}
