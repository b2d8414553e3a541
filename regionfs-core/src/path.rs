//! Path parsing and resolution.
//!
//! Paths are absolute and slash separated. Empty components are skipped, so
//! `//a///b/` names the same entry as `/a/b`.

use crate::alloc::Arena;
use crate::error::{FsError, Result};
use crate::layout::{Inode, NAME_MAX};
use crate::namespace::dir::{self, Entry};
use crate::types::RegionOffset;

/// Split `path` into its non-empty components.
pub fn components(path: &str) -> Result<Vec<&str>> {
    if !path.starts_with('/') {
        return Err(FsError::invalid_path(path, "path must be absolute"));
    }
    let parts: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();
    for part in &parts {
        if part.len() > NAME_MAX {
            return Err(FsError::NameTooLong {
                len: part.len(),
                max: NAME_MAX,
            });
        }
    }
    Ok(parts)
}

/// Rebuild `path` without empty components.
pub fn normalize(path: &str) -> Result<String> {
    let parts = components(path)?;
    Ok(format!("/{}", parts.join("/")))
}

/// Split `path` into its parent path and final name.
///
/// Fails with `InvalidPath` for the root, which has no parent.
pub fn split_parent(path: &str) -> Result<(String, &str)> {
    let mut parts = components(path)?;
    let Some(name) = parts.pop() else {
        return Err(FsError::invalid_path(path, "the root has no parent"));
    };
    Ok((format!("/{}", parts.join("/")), name))
}

/// Check that `name` may be given to a new entry.
pub fn validate_name(name: &str) -> Result<()> {
    if name.len() > NAME_MAX {
        return Err(FsError::NameTooLong {
            len: name.len(),
            max: NAME_MAX,
        });
    }
    if name.is_empty() || name == "." || name == ".." {
        return Err(FsError::invalid_path(name, "reserved entry name"));
    }
    if name.bytes().any(|b| b == 0 || b == b'/') {
        return Err(FsError::invalid_path(name, "name contains NUL or '/'"));
    }
    Ok(())
}

/// Check whether `path` lies strictly inside `ancestor`.
pub fn is_descendant(path: &str, ancestor: &str) -> Result<bool> {
    let path = components(path)?;
    let ancestor = components(ancestor)?;
    Ok(path.len() > ancestor.len() && path.starts_with(&ancestor))
}

/// Where a path led.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// Offset of the inode record.
    pub at: RegionOffset,
    /// The decoded inode.
    pub inode: Inode,
    /// Position in the parent's child array; `None` for the root.
    pub index: Option<u64>,
}

/// Walk `path` from the root directory at `root`.
pub fn resolve(arena: &Arena<'_>, root: RegionOffset, path: &str) -> Result<Resolved> {
    let mut current = Resolved {
        at: root,
        inode: Inode::load(arena.region(), root)?,
        index: None,
    };
    let parts = components(path)?;
    for (depth, part) in parts.iter().enumerate() {
        if !current.inode.is_dir() {
            return Err(FsError::NotADirectory {
                path: format!("/{}", parts[..depth].join("/")),
            });
        }
        let Some(Entry { index, at, inode }) = dir::lookup(arena, current.at, part)? else {
            return Err(FsError::not_found(format!("/{}", parts[..=depth].join("/"))));
        };
        current = Resolved {
            at,
            inode,
            index: Some(index),
        };
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{INODE_SIZE, InodeKind};
    use crate::region::Region;
    use crate::types::Timespec;

    #[test]
    fn component_splitting() {
        assert_eq!(components("/").unwrap(), Vec::<&str>::new());
        assert_eq!(components("//a///b/").unwrap(), vec!["a", "b"]);
        assert_eq!(components("relative").unwrap_err().code(), "E007");
        assert_eq!(normalize("/a//b/").unwrap(), "/a/b");
        assert_eq!(normalize("///").unwrap(), "/");
    }

    #[test]
    fn parent_split() {
        assert_eq!(split_parent("/a/b/c").unwrap(), ("/a/b".to_string(), "c"));
        assert_eq!(split_parent("/top").unwrap(), ("/".to_string(), "top"));
        assert!(split_parent("/").is_err());
    }

    #[test]
    fn name_rules() {
        assert!(validate_name("ok.txt").is_ok());
        assert!(validate_name(&"x".repeat(255)).is_ok());
        assert_eq!(validate_name(&"x".repeat(256)).unwrap_err().code(), "E006");
        assert_eq!(validate_name("..").unwrap_err().code(), "E007");
        assert_eq!(validate_name("a\0b").unwrap_err().code(), "E007");
        assert_eq!(components(&format!("/{}", "y".repeat(300))).unwrap_err().code(), "E006");
    }

    #[test]
    fn descendant_check() {
        assert!(is_descendant("/a/b", "/a").unwrap());
        assert!(!is_descendant("/a", "/a").unwrap());
        assert!(!is_descendant("/ab", "/a").unwrap());
        assert!(is_descendant("/a", "/").unwrap());
    }

    #[test]
    fn resolution() {
        let mut buf = vec![0u8; 8192];
        let mut arena = Arena::attach(Region::new(&mut buf)).unwrap();
        let root = arena.allocate(INODE_SIZE).unwrap().unwrap();
        Inode::new("/", InodeKind::Directory, Timespec::ZERO)
            .store(arena.region_mut(), root)
            .unwrap();
        let a = dir::insert(
            &mut arena,
            root,
            &Inode::new("a", InodeKind::Directory, Timespec::ZERO),
            Timespec::ZERO,
        )
        .unwrap();
        dir::insert(
            &mut arena,
            a,
            &Inode::new("f", InodeKind::File, Timespec::ZERO),
            Timespec::ZERO,
        )
        .unwrap();

        let found = resolve(&arena, root, "/a//f").unwrap();
        assert_eq!(found.inode.name, "f");
        assert_eq!(found.index, Some(0));
        assert!(resolve(&arena, root, "/").unwrap().index.is_none());

        let err = resolve(&arena, root, "/a/missing").unwrap_err();
        assert!(matches!(err, FsError::NotFound { ref path } if path == "/a/missing"));
        let err = resolve(&arena, root, "/a/f/deeper").unwrap_err();
        assert!(matches!(err, FsError::NotADirectory { ref path } if path == "/a/f"));
    }
}
