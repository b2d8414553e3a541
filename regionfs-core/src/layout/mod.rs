//! On-region record layouts.
//!
//! Everything persisted in a region is one of four fixed-size records, all
//! little-endian and 8-byte aligned:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │ Superblock (32 bytes, offset 0)                                  │
//! │   magic | version | size | free_head | root                      │
//! ├──────────────────────────────────────────────────────────────────┤
//! │ Heap: contiguous spans, each starting with a 16 byte header      │
//! │ ┌──────────────┬──────────────────────────────────────────────┐  │
//! │ │ size | next  │ payload: inode array, file block, data ...   │  │
//! │ └──────────────┴──────────────────────────────────────────────┘  │
//! │ ...                                                              │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Inodes (312 bytes) live in directory child arrays; file blocks (24 bytes)
//! form a singly-linked chain, each pointing at its own data span.

mod block;
mod inode;
mod span;
mod superblock;

pub use block::{FILE_BLOCK_SIZE, FileBlock};
pub use inode::{INODE_SIZE, Inode, InodeData, InodeKind, NAME_CAPACITY, NAME_MAX};
pub use span::{ALIGNMENT, SPAN_HEADER_SIZE, SpanHeader, align_up, span_size_for};
pub use superblock::{
    MIN_REGION_SIZE, REGION_MAGIC, REGION_VERSION, SUPERBLOCK_SIZE, Superblock,
};
