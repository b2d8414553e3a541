//! Prelude for convenient imports.
//!
//! ```
//! use regionfs_core::prelude::*;
//! ```

// Core types
pub use crate::types::{RegionOffset, Timespec};

// Error handling
pub use crate::error::{FsError, Result};

// Filesystem
pub use crate::fs::{CheckReport, FileAttr, FileKind, FileSystem, FsStats};

// Images
pub use crate::image::{ImageConfig, RegionImage};
pub use crate::mount::Mount;

// Clocks
pub use crate::clock::{Clock, MockClock, SystemClock};
