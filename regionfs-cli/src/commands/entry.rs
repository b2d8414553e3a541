//! Namespace commands: listing, creation, removal and renaming.

use anyhow::{Context, Result};
use regionfs_core::fs::FileAttr;
use regionfs_core::{FsError, Timespec, path};
use std::path::Path;

/// Owner reported for entries: the owner of the image file.
#[cfg(unix)]
fn owner(image: &Path) -> (u32, u32) {
    use std::os::unix::fs::MetadataExt;
    std::fs::metadata(image)
        .map(|m| (m.uid(), m.gid()))
        .unwrap_or((0, 0))
}

#[cfg(not(unix))]
fn owner(_image: &Path) -> (u32, u32) {
    (0, 0)
}

fn join(dir: &str, name: &str) -> String {
    if dir == "/" {
        format!("/{}", name)
    } else {
        format!("{}/{}", dir, name)
    }
}

/// Render `drwxr-xr-x` style mode bits.
fn mode_string(attr: &FileAttr) -> String {
    let mut out = String::with_capacity(10);
    out.push(if attr.is_dir() { 'd' } else { '-' });
    let perms = attr.permissions();
    for shift in [6, 3, 0] {
        let bits = (perms >> shift) & 0o7;
        out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        out.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        out.push(if bits & 0o1 != 0 { 'x' } else { '-' });
    }
    out
}

/// List a directory.
pub fn ls(image: &Path, dir: &str, long: bool) -> Result<()> {
    let mount = super::open(image)?;
    let (uid, gid) = owner(image);
    let dir = path::normalize(dir)?;

    let listing = mount.with_fs(|fs| {
        let names = fs.readdir(&dir)?;
        let mut listing = Vec::with_capacity(names.len());
        for name in names {
            let attr = if long {
                Some(fs.getattr(&join(&dir, &name), uid, gid)?)
            } else {
                None
            };
            listing.push((name, attr));
        }
        Ok(listing)
    })?;

    for (name, attr) in listing {
        match attr {
            Some(attr) => println!(
                "{} {:>3} {:>5} {:>5} {:>12} {} {}",
                mode_string(&attr),
                attr.nlink,
                attr.uid,
                attr.gid,
                attr.size,
                attr.mtime,
                name
            ),
            None => println!("{}", name),
        }
    }
    Ok(())
}

/// Show the attributes of one entry.
pub fn stat(image: &Path, target: &str, json: bool) -> Result<()> {
    let mount = super::open(image)?;
    let (uid, gid) = owner(image);
    let attr = mount.with_fs(|fs| fs.getattr(target, uid, gid))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&attr)?);
        return Ok(());
    }

    println!("  Path: {}", target);
    println!(
        "  Type: {}",
        if attr.is_dir() { "directory" } else { "regular file" }
    );
    println!("  Size: {}", attr.size);
    println!(" Links: {}", attr.nlink);
    println!("  Mode: {:o} ({})", attr.mode, mode_string(&attr));
    println!("Access: {}", attr.atime);
    println!("Modify: {}", attr.mtime);
    Ok(())
}

/// Create a directory, optionally with its missing parents.
pub fn mkdir(image: &Path, target: &str, parents: bool) -> Result<()> {
    let mount = super::open(image)?;

    if !parents {
        mount
            .with_fs(|fs| fs.mkdir(target))
            .with_context(|| format!("Failed to create directory {}", target))?;
        tracing::info!(path = %target, "Created directory");
        return Ok(());
    }

    let parts: Vec<String> = path::components(target)?
        .into_iter()
        .map(str::to_string)
        .collect();
    mount.with_fs(|fs| {
        let mut current = String::new();
        for part in &parts {
            current.push('/');
            current.push_str(part);
            match fs.mkdir(&current) {
                Ok(()) => tracing::info!(path = %current, "Created directory"),
                Err(FsError::AlreadyExists { .. }) => {
                    if !fs.getattr(&current, 0, 0)?.is_dir() {
                        return Err(FsError::NotADirectory { path: current });
                    }
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    })?;
    Ok(())
}

/// Create an empty file, or refresh the times of an existing entry.
pub fn touch(image: &Path, target: &str) -> Result<()> {
    let mount = super::open(image)?;
    mount.with_fs(|fs| match fs.mknod(target) {
        Ok(()) => {
            tracing::info!(path = %target, "Created file");
            Ok(())
        }
        Err(FsError::AlreadyExists { .. }) => fs.touch(target),
        Err(e) => Err(e),
    })?;
    Ok(())
}

/// Remove a regular file.
pub fn rm(image: &Path, target: &str) -> Result<()> {
    let mount = super::open(image)?;
    mount
        .with_fs(|fs| fs.unlink(target))
        .with_context(|| format!("Failed to remove {}", target))?;
    tracing::info!(path = %target, "Removed file");
    Ok(())
}

/// Remove an empty directory.
pub fn rmdir(image: &Path, target: &str) -> Result<()> {
    let mount = super::open(image)?;
    mount
        .with_fs(|fs| fs.rmdir(target))
        .with_context(|| format!("Failed to remove directory {}", target))?;
    tracing::info!(path = %target, "Removed directory");
    Ok(())
}

/// Move or rename an entry.
pub fn mv(image: &Path, from: &str, to: &str) -> Result<()> {
    let mount = super::open(image)?;
    mount
        .with_fs(|fs| fs.rename(from, to))
        .with_context(|| format!("Failed to rename {} to {}", from, to))?;
    tracing::info!(from = %from, to = %to, "Renamed");
    Ok(())
}

/// Set both timestamps explicitly.
pub fn settime(image: &Path, target: &str, atime: Timespec, mtime: Timespec) -> Result<()> {
    let mount = super::open(image)?;
    mount.with_fs(|fs| fs.utimens(target, atime, mtime))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use regionfs_core::fs::FileKind;

    #[test]
    fn test_mode_string() {
        let dir = FileAttr {
            kind: FileKind::Directory,
            mode: FileKind::Directory.type_bits() | 0o755,
            ..Default::default()
        };
        assert_eq!(mode_string(&dir), "drwxr-xr-x");

        let file = FileAttr {
            mode: FileKind::RegularFile.type_bits() | 0o640,
            ..Default::default()
        };
        assert_eq!(mode_string(&file), "-rw-r-----");
    }

    #[test]
    fn test_join() {
        assert_eq!(join("/", "a"), "/a");
        assert_eq!(join("/a", "b"), "/a/b");
    }
}
