//! regionfs Core Library
//!
//! A position-independent filesystem that lives entirely inside one byte
//! region. The region holds its own allocator, a hierarchical namespace and
//! every file's contents, and refers to all of it by offset from the region
//! base, so the same bytes can be unmapped and mapped again at a different
//! address without any fix-up.
//!
//! # Key Components
//!
//! - **Region**: bounds-checked, offset-addressed view over the buffer
//! - **Layout**: bit-exact superblock, span, inode and file block records
//! - **Arena**: first-fit, coalescing free-list allocator inside the region
//! - **Namespace**: directory child arrays and file block chains
//! - **FileSystem**: the thirteen POSIX-style operations plus a checker
//! - **Posix**: "region, error slot, args -> status" entry points
//! - **Image / Mount**: file-backed regions and serialized shared access
//!
//! # Example
//!
//! ```
//! use regionfs_core::prelude::*;
//!
//! let mut region = vec![0u8; 64 * 1024];
//! let mut fs = FileSystem::mount(&mut region)?;
//!
//! fs.mkdir("/a")?;
//! fs.mknod("/a/b")?;
//! fs.write("/a/b", b"hello", 0)?;
//!
//! let mut buf = [0u8; 5];
//! assert_eq!(fs.read("/a/b", &mut buf, 0)?, 5);
//! assert_eq!(&buf, b"hello");
//! # Ok::<(), FsError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod alloc;
pub mod clock;
pub mod error;
pub mod fs;
pub mod image;
pub mod layout;
pub mod mount;
pub mod namespace;
pub mod path;
pub mod posix;
pub mod prelude;
pub mod region;
pub mod types;

// Re-export key types at crate root for convenience
pub use crate::alloc::{AllocatorReport, Arena};
pub use clock::{Clock, MockClock, SystemClock};
pub use error::{FsError, Result};
pub use fs::{CheckReport, FileAttr, FileKind, FileSystem, FsStats};
pub use image::{ImageConfig, RegionImage};
pub use mount::Mount;
pub use region::Region;
pub use types::{RegionOffset, Timespec};
