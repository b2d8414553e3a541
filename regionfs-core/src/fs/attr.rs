//! Attribute and statistics records returned by operations.

use crate::types::Timespec;
use serde::{Deserialize, Serialize};

/// Permission bits reported for every entry.
pub const DEFAULT_PERMISSIONS: u32 = 0o755;

/// Block size reported by `statfs`.
pub const STATFS_BLOCK_SIZE: u64 = 1024;

/// Entry type as seen by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    /// A directory.
    Directory,
    /// A regular file.
    #[default]
    RegularFile,
}

impl FileKind {
    /// The `S_IFMT` bits for this kind.
    pub fn type_bits(self) -> u32 {
        match self {
            Self::Directory => libc::S_IFDIR as u32,
            Self::RegularFile => libc::S_IFREG as u32,
        }
    }
}

/// The `stat`-like view of an entry.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FileAttr {
    /// Entry type.
    pub kind: FileKind,
    /// Type and permission bits.
    pub mode: u32,
    /// Link count: 1 for files, 2 plus subdirectories for directories.
    pub nlink: u64,
    /// File length; 0 for directories.
    pub size: u64,
    /// Owner, echoed from the caller.
    pub uid: u32,
    /// Group, echoed from the caller.
    pub gid: u32,
    /// Last access time.
    pub atime: Timespec,
    /// Last modification time.
    pub mtime: Timespec,
}

impl FileAttr {
    /// Check if the entry is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Directory
    }

    /// Permission bits without the type.
    pub fn permissions(&self) -> u32 {
        self.mode & 0o7777
    }
}

/// Filesystem-wide statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FsStats {
    /// Reported block size.
    pub block_size: u64,
    /// Heap size in blocks.
    pub blocks: u64,
    /// Free heap bytes in blocks.
    pub blocks_free: u64,
    /// Blocks available to callers; equal to `blocks_free`.
    pub blocks_available: u64,
    /// Longest entry name.
    pub name_max: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_bits() {
        let attr = FileAttr {
            kind: FileKind::Directory,
            mode: FileKind::Directory.type_bits() | DEFAULT_PERMISSIONS,
            ..Default::default()
        };
        assert!(attr.is_dir());
        assert_eq!(attr.permissions(), 0o755);
        assert_eq!(attr.mode & libc::S_IFMT as u32, libc::S_IFDIR as u32);
    }

    #[test]
    fn attr_serializes_with_kind_names() {
        let json = serde_json::to_string(&FileAttr::default()).unwrap();
        assert!(json.contains("\"kind\":\"regular_file\""));
    }
}
