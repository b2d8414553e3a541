//! Inode records.
//!
//! An inode is 312 bytes:
//!
//! | offset | field |
//! |---|---|
//! | 0   | name, NUL padded (256) |
//! | 256 | atime sec, nsec |
//! | 272 | mtime sec, nsec |
//! | 288 | kind (u32), 4 pad bytes |
//! | 296 | payload: file `(size, first_block)`, directory `(num_children, children)` |

use crate::error::{FsError, Result};
use crate::region::Region;
use crate::types::{RegionOffset, Timespec};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};
use std::io::{self, Cursor, Read, Write};

/// Size of an inode record in bytes.
pub const INODE_SIZE: u64 = 312;

/// Size of the NUL-padded name buffer.
pub const NAME_CAPACITY: usize = 256;

/// Longest storable name in bytes.
pub const NAME_MAX: usize = NAME_CAPACITY - 1;

const ATIME: u64 = 256;
const MTIME: u64 = 272;
const PAYLOAD: u64 = 296;

/// Inode type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InodeKind {
    /// A directory with a child array.
    Directory,
    /// A regular file with a block chain.
    File,
}

impl InodeKind {
    /// The on-region tag.
    pub const fn tag(self) -> u32 {
        match self {
            Self::Directory => 0,
            Self::File => 1,
        }
    }

    /// Decode an on-region tag.
    pub const fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            0 => Some(Self::Directory),
            1 => Some(Self::File),
            _ => None,
        }
    }
}

/// Kind-specific inode payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InodeData {
    /// Directory payload.
    Directory {
        /// Number of records in the child array.
        num_children: u64,
        /// Payload offset of the child array, null when empty.
        children: RegionOffset,
    },
    /// Regular file payload.
    File {
        /// File length in bytes.
        size: u64,
        /// First block of the chain, null when empty.
        first_block: RegionOffset,
    },
}

impl InodeData {
    /// Payload of a fresh, empty inode of `kind`.
    pub const fn empty(kind: InodeKind) -> Self {
        match kind {
            InodeKind::Directory => Self::Directory {
                num_children: 0,
                children: RegionOffset::NULL,
            },
            InodeKind::File => Self::File {
                size: 0,
                first_block: RegionOffset::NULL,
            },
        }
    }

    fn kind(&self) -> InodeKind {
        match self {
            Self::Directory { .. } => InodeKind::Directory,
            Self::File { .. } => InodeKind::File,
        }
    }

    fn words(&self) -> (u64, RegionOffset) {
        match *self {
            Self::Directory {
                num_children,
                children,
            } => (num_children, children),
            Self::File { size, first_block } => (size, first_block),
        }
    }
}

/// A decoded inode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inode {
    /// Entry name (at most [`NAME_MAX`] bytes).
    pub name: String,
    /// Last access time.
    pub atime: Timespec,
    /// Last modification time.
    pub mtime: Timespec,
    /// Kind-specific payload.
    pub data: InodeData,
}

impl Inode {
    /// A fresh inode with both timestamps set to `now`.
    pub fn new(name: impl Into<String>, kind: InodeKind, now: Timespec) -> Self {
        Self {
            name: name.into(),
            atime: now,
            mtime: now,
            data: InodeData::empty(kind),
        }
    }

    /// The inode's kind.
    pub fn kind(&self) -> InodeKind {
        self.data.kind()
    }

    /// Check if this is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind() == InodeKind::Directory
    }

    /// Decode an inode from its 312 byte record.
    pub fn from_bytes(bytes: &[u8]) -> io::Result<Self> {
        let mut cursor = Cursor::new(bytes);

        let mut name = [0u8; NAME_CAPACITY];
        cursor.read_exact(&mut name)?;
        let len = name.iter().position(|b| *b == 0).unwrap_or(NAME_CAPACITY);
        let name = String::from_utf8_lossy(&name[..len]).into_owned();

        let atime = Timespec::new(
            cursor.read_i64::<LittleEndian>()?,
            cursor.read_i64::<LittleEndian>()?,
        );
        let mtime = Timespec::new(
            cursor.read_i64::<LittleEndian>()?,
            cursor.read_i64::<LittleEndian>()?,
        );
        let tag = cursor.read_u32::<LittleEndian>()?;
        let _pad = cursor.read_u32::<LittleEndian>()?;
        let a = cursor.read_u64::<LittleEndian>()?;
        let b = RegionOffset::new(cursor.read_u64::<LittleEndian>()?);

        let data = match InodeKind::from_tag(tag) {
            Some(InodeKind::Directory) => InodeData::Directory {
                num_children: a,
                children: b,
            },
            Some(InodeKind::File) => InodeData::File {
                size: a,
                first_block: b,
            },
            None => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("Unknown inode kind {}", tag),
                ));
            }
        };

        Ok(Self {
            name,
            atime,
            mtime,
            data,
        })
    }

    /// Encode the inode into its 312 byte record.
    pub fn to_bytes(&self) -> io::Result<Vec<u8>> {
        let name = self.name.as_bytes();
        if name.len() > NAME_MAX {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Name of {} bytes does not fit the inode", name.len()),
            ));
        }

        let mut buf = Vec::with_capacity(INODE_SIZE as usize);
        buf.write_all(name)?;
        buf.resize(NAME_CAPACITY, 0);
        buf.write_i64::<LittleEndian>(self.atime.sec)?;
        buf.write_i64::<LittleEndian>(self.atime.nsec)?;
        buf.write_i64::<LittleEndian>(self.mtime.sec)?;
        buf.write_i64::<LittleEndian>(self.mtime.nsec)?;
        buf.write_u32::<LittleEndian>(self.kind().tag())?;
        buf.write_u32::<LittleEndian>(0)?;
        let (a, b) = self.data.words();
        buf.write_u64::<LittleEndian>(a)?;
        buf.write_u64::<LittleEndian>(b.as_u64())?;

        debug_assert_eq!(buf.len() as u64, INODE_SIZE);
        Ok(buf)
    }

    /// Read the inode record at `at`.
    pub fn load(region: &Region<'_>, at: RegionOffset) -> Result<Self> {
        let bytes = region.bytes(at, INODE_SIZE)?;
        Self::from_bytes(bytes).map_err(|e| FsError::corrupted(at, e.to_string()))
    }

    /// Write the inode record at `at`.
    pub fn store(&self, region: &mut Region<'_>, at: RegionOffset) -> Result<()> {
        let bytes = self
            .to_bytes()
            .map_err(|e| FsError::corrupted(at, e.to_string()))?;
        region.bytes_mut(at, INODE_SIZE)?.copy_from_slice(&bytes);
        Ok(())
    }

    /// Overwrite only the payload words of the inode at `at`.
    pub fn store_data(region: &mut Region<'_>, at: RegionOffset, data: InodeData) -> Result<()> {
        let (a, b) = data.words();
        let base = at.as_u64();
        region.write_u64(RegionOffset::new(base + PAYLOAD), a)?;
        region.write_offset(RegionOffset::new(base + PAYLOAD + 8), b)
    }

    /// Overwrite both timestamps of the inode at `at`.
    pub fn store_times(
        region: &mut Region<'_>,
        at: RegionOffset,
        atime: Timespec,
        mtime: Timespec,
    ) -> Result<()> {
        write_time(region, RegionOffset::new(at.as_u64() + ATIME), atime)?;
        Self::store_mtime(region, at, mtime)
    }

    /// Overwrite the modification time of the inode at `at`.
    pub fn store_mtime(region: &mut Region<'_>, at: RegionOffset, mtime: Timespec) -> Result<()> {
        write_time(region, RegionOffset::new(at.as_u64() + MTIME), mtime)
    }
}

fn write_time(region: &mut Region<'_>, at: RegionOffset, time: Timespec) -> Result<()> {
    region.write_u64(at, time.sec as u64)?;
    region.write_u64(RegionOffset::new(at.as_u64() + 8), time.nsec as u64)
}
