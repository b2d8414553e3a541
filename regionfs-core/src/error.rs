//! Error types for regionfs.
//!
//! Every failure an operation can report is a variant of [`FsError`]. Each
//! variant maps onto one POSIX error number through [`FsError::errno`], which
//! is what the calling convention in [`crate::posix`] writes into its error
//! slot.

use crate::types::RegionOffset;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for regionfs operations.
#[derive(Error, Debug)]
pub enum FsError {
    // =========================================================================
    // Namespace Errors (E001-E099)
    // =========================================================================
    /// A path component does not exist.
    #[error("E001: No such file or directory: {path}")]
    NotFound {
        /// The path (or name) that could not be resolved.
        path: String,
    },

    /// The creation target already exists.
    #[error("E002: File exists: {path}")]
    AlreadyExists {
        /// The existing path.
        path: String,
    },

    /// A directory was required but a regular file was found.
    #[error("E003: Not a directory: {path}")]
    NotADirectory {
        /// The offending path.
        path: String,
    },

    /// A regular file was required but a directory was found.
    #[error("E004: Is a directory: {path}")]
    IsADirectory {
        /// The offending path.
        path: String,
    },

    /// Removal of a directory that still has children.
    #[error("E005: Directory not empty: {path}")]
    NotEmpty {
        /// The non-empty directory.
        path: String,
    },

    /// A path component exceeds the inode name buffer.
    #[error("E006: File name too long ({len} bytes, max {max})")]
    NameTooLong {
        /// Length of the rejected name in bytes.
        len: usize,
        /// Maximum accepted length.
        max: usize,
    },

    /// The path is malformed or the request is not meaningful for it.
    #[error("E007: Invalid path '{path}': {cause}")]
    InvalidPath {
        /// The rejected path.
        path: String,
        /// Why it was rejected.
        cause: String,
    },

    /// The root directory cannot be removed or replaced.
    #[error("E008: Resource busy: {path}")]
    Busy {
        /// The path that is in use.
        path: String,
    },

    // =========================================================================
    // Space Errors (E100-E199)
    // =========================================================================
    /// The arena allocator could not satisfy a request.
    #[error("E101: No space left in region: requested {requested} bytes, {available} bytes free")]
    NoSpace {
        /// Number of bytes requested.
        requested: u64,
        /// Number of free bytes in the region at the time of the request.
        available: u64,
    },

    /// Host memory could not be reserved for an operation result.
    #[error("E102: Out of memory: {cause}")]
    OutOfMemory {
        /// What was being built.
        cause: String,
    },

    /// A byte position does not fit the file size arithmetic.
    #[error("E103: File too large: {path}")]
    FileTooLarge {
        /// The file being extended.
        path: String,
    },

    // =========================================================================
    // Region Errors (E200-E299)
    // =========================================================================
    /// The superblock is missing, invalid or does not fit the region.
    #[error("E201: Bad region: {cause}")]
    BadRegion {
        /// Reason the region was rejected.
        cause: String,
    },

    /// A structure inside the region is inconsistent.
    #[error("E202: Region corruption detected at offset {offset}: {cause}")]
    Corrupted {
        /// Offset where the inconsistency was found.
        offset: RegionOffset,
        /// Description of the inconsistency.
        cause: String,
    },

    // =========================================================================
    // Image Errors (E300-E399)
    // =========================================================================
    /// Creating, mapping or flushing a backup file failed.
    #[error("E301: Image I/O failed at {path}: {cause}")]
    Io {
        /// The backup file path.
        path: PathBuf,
        /// Reason for the failure.
        cause: String,
    },
}

impl FsError {
    /// Create a not-found error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Create an invalid-path error.
    pub fn invalid_path(path: impl Into<String>, cause: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            cause: cause.into(),
        }
    }

    /// Create a corruption error.
    pub fn corrupted(offset: RegionOffset, cause: impl Into<String>) -> Self {
        Self::Corrupted {
            offset,
            cause: cause.into(),
        }
    }

    /// Create a bad-region error.
    pub fn bad_region(cause: impl Into<String>) -> Self {
        Self::BadRegion {
            cause: cause.into(),
        }
    }

    /// Get the error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "E001",
            Self::AlreadyExists { .. } => "E002",
            Self::NotADirectory { .. } => "E003",
            Self::IsADirectory { .. } => "E004",
            Self::NotEmpty { .. } => "E005",
            Self::NameTooLong { .. } => "E006",
            Self::InvalidPath { .. } => "E007",
            Self::Busy { .. } => "E008",
            Self::NoSpace { .. } => "E101",
            Self::OutOfMemory { .. } => "E102",
            Self::FileTooLarge { .. } => "E103",
            Self::BadRegion { .. } => "E201",
            Self::Corrupted { .. } => "E202",
            Self::Io { .. } => "E301",
        }
    }

    /// The POSIX error number reported for this error.
    #[must_use]
    pub fn errno(&self) -> i32 {
        match self {
            Self::NotFound { .. } => libc::ENOENT,
            Self::AlreadyExists { .. } => libc::EEXIST,
            Self::NotADirectory { .. } => libc::ENOTDIR,
            Self::IsADirectory { .. } => libc::EISDIR,
            Self::NotEmpty { .. } => libc::ENOTEMPTY,
            Self::NameTooLong { .. } => libc::ENAMETOOLONG,
            Self::InvalidPath { .. } => libc::EINVAL,
            Self::Busy { .. } => libc::EBUSY,
            Self::NoSpace { .. } => libc::ENOSPC,
            Self::OutOfMemory { .. } => libc::ENOMEM,
            Self::FileTooLarge { .. } => libc::EFBIG,
            Self::BadRegion { .. } | Self::Corrupted { .. } => libc::EFAULT,
            Self::Io { .. } => libc::EIO,
        }
    }

    /// Check if this error means the region ran out of room.
    #[must_use]
    pub fn is_space_error(&self) -> bool {
        matches!(self, Self::NoSpace { .. } | Self::FileTooLarge { .. })
    }

    /// Check if this error means the region itself cannot be trusted.
    #[must_use]
    pub fn is_region_error(&self) -> bool {
        matches!(self, Self::BadRegion { .. } | Self::Corrupted { .. })
    }
}

/// Result type alias using `FsError`.
pub type Result<T> = std::result::Result<T, FsError>;
