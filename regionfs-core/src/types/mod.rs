//! Core types for regionfs.
//!
//! - `RegionOffset`: position-independent location inside a region
//! - `Timespec`: second/nanosecond timestamp as stored in inode records

mod offset;
mod time;

pub use offset::RegionOffset;
pub use time::{ParseTimespecError, Timespec};
