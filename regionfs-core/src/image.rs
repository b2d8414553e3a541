//! Region images: the byte buffer a filesystem lives in.
//!
//! An image is either anonymous memory or a backup file mapped with
//! `memmap2`. File-backed images hold an exclusive `fs2` lock for as long as
//! they are open and are flushed when dropped, so whatever was written before
//! unmounting is on disk afterwards.

use crate::clock::Clock;
use crate::error::{FsError, Result};
use crate::fs::FileSystem;
use crate::layout::MIN_REGION_SIZE;
use fs2::FileExt;
use memmap2::{MmapMut, MmapOptions};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// Default image size: 16 MB.
pub const DEFAULT_IMAGE_SIZE: u64 = 16 * 1024 * 1024;

/// Maximum image size: 4 GB.
pub const MAX_IMAGE_SIZE: u64 = 4 * 1024 * 1024 * 1024;

/// Configuration for opening an image.
#[derive(Debug, Clone)]
pub struct ImageConfig {
    /// Size of a newly created image in bytes.
    pub size: u64,
    /// Backup file; `None` keeps the image in anonymous memory.
    pub backup_file: Option<PathBuf>,
    /// Whether to flush after every mutating call through a [`Mount`](crate::Mount).
    pub sync_on_write: bool,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_IMAGE_SIZE,
            backup_file: None,
            sync_on_write: false,
        }
    }
}

impl ImageConfig {
    /// An anonymous image of `size` bytes.
    pub fn anonymous(size: u64) -> Self {
        Self::default().with_size(size)
    }

    /// Create config with a custom size.
    ///
    /// Sizes outside `MIN_REGION_SIZE..=MAX_IMAGE_SIZE` are rejected when the
    /// image is opened.
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    /// Back the image with a file.
    pub fn with_backup_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.backup_file = Some(path.into());
        self
    }

    /// Enable sync on write for durability.
    pub fn with_sync(mut self, sync: bool) -> Self {
        self.sync_on_write = sync;
        self
    }
}

enum Backing {
    Memory(Vec<u8>),
    File { mmap: MmapMut, file: File, path: PathBuf },
}

/// An open region image.
pub struct RegionImage {
    backing: Backing,
    sync_on_write: bool,
}

fn io_error(path: &Path, cause: impl ToString) -> FsError {
    FsError::Io {
        path: path.to_path_buf(),
        cause: cause.to_string(),
    }
}

impl RegionImage {
    /// Open or create the image described by `config`.
    ///
    /// An existing, non-empty backup file is mapped at its current length and
    /// `config.size` is ignored; otherwise the file is created and sized with
    /// zeros.
    pub fn open(config: &ImageConfig) -> Result<Self> {
        let backing = match &config.backup_file {
            None => {
                check_size(config.size)?;
                Backing::Memory(vec![0u8; config.size as usize])
            }
            Some(path) => {
                if !path.exists() {
                    check_size(config.size)?;
                }
                Self::map_file(path, config.size)?
            }
        };
        Ok(Self {
            backing,
            sync_on_write: config.sync_on_write,
        })
    }

    fn map_file(path: &Path, size: u64) -> Result<Backing> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| io_error(path, e))?;

        file.try_lock_exclusive()
            .map_err(|e| io_error(path, format!("Failed to lock file: {}", e)))?;

        let existing = file.metadata().map_err(|e| io_error(path, e))?.len();
        let len = if existing == 0 {
            check_size(size)?;
            file.set_len(size).map_err(|e| io_error(path, e))?;
            tracing::info!(path = %path.display(), size, "Created backup file");
            size
        } else {
            check_size(existing)?;
            existing
        };

        // The file is locked exclusively for the lifetime of the mapping.
        let mmap = unsafe {
            MmapOptions::new()
                .len(len as usize)
                .map_mut(&file)
                .map_err(|e| io_error(path, e))?
        };

        tracing::debug!(path = %path.display(), len, "Mapped backup file");
        Ok(Backing::File {
            mmap,
            file,
            path: path.to_path_buf(),
        })
    }

    /// Image length in bytes.
    pub fn len(&self) -> u64 {
        self.as_slice().len() as u64
    }

    /// Check if the image has no bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The backup file, if any.
    pub fn path(&self) -> Option<&Path> {
        match &self.backing {
            Backing::Memory(_) => None,
            Backing::File { path, .. } => Some(path),
        }
    }

    /// Whether mounts should flush after each call.
    pub fn sync_on_write(&self) -> bool {
        self.sync_on_write
    }

    /// The image bytes.
    pub fn as_slice(&self) -> &[u8] {
        match &self.backing {
            Backing::Memory(bytes) => bytes,
            Backing::File { mmap, .. } => mmap,
        }
    }

    /// The image bytes, mutably.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        match &mut self.backing {
            Backing::Memory(bytes) => bytes,
            Backing::File { mmap, .. } => mmap,
        }
    }

    /// Mount the filesystem stored in this image.
    pub fn mount(&mut self) -> Result<FileSystem<'_>> {
        FileSystem::mount(self.as_mut_slice())
    }

    /// Mount with a custom clock.
    pub fn mount_with_clock<C: Clock>(&mut self, clock: C) -> Result<FileSystem<'_, C>> {
        FileSystem::mount_with_clock(self.as_mut_slice(), clock)
    }

    /// Zero the image so the next mount formats it.
    pub fn wipe(&mut self) {
        self.as_mut_slice().fill(0);
    }

    /// Flush a file-backed image to disk; a no-op for anonymous images.
    pub fn flush(&self) -> Result<()> {
        match &self.backing {
            Backing::Memory(_) => Ok(()),
            Backing::File { mmap, path, .. } => mmap.flush().map_err(|e| io_error(path, e)),
        }
    }
}

fn check_size(size: u64) -> Result<()> {
    if size < MIN_REGION_SIZE {
        return Err(FsError::bad_region(format!(
            "Image of {} bytes is below the {} byte minimum",
            size, MIN_REGION_SIZE
        )));
    }
    if size > MAX_IMAGE_SIZE {
        return Err(FsError::bad_region(format!(
            "Image of {} bytes exceeds the {} byte maximum",
            size, MAX_IMAGE_SIZE
        )));
    }
    Ok(())
}

impl Drop for RegionImage {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::warn!(error = %e, "Failed to flush image on close");
        }
        if let Backing::File { file, .. } = &self.backing {
            let _ = fs2::FileExt::unlock(file);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn anonymous_image_is_zeroed() {
        let image = RegionImage::open(&ImageConfig::anonymous(4096)).unwrap();
        assert_eq!(image.len(), 4096);
        assert!(image.path().is_none());
        assert!(image.as_slice().iter().all(|b| *b == 0));
    }

    #[test]
    fn undersized_image_is_rejected() {
        let err = RegionImage::open(&ImageConfig::anonymous(100)).err().unwrap();
        assert_eq!(err.code(), "E201");
    }

    #[test]
    fn oversized_image_is_rejected() {
        let config = ImageConfig::anonymous(MAX_IMAGE_SIZE + 1);
        assert_eq!(config.size, MAX_IMAGE_SIZE + 1);
        let err = RegionImage::open(&config).err().unwrap();
        assert_eq!(err.code(), "E201");

        // No backup file is left behind for a size that cannot be used.
        let dir = tempdir().unwrap();
        let path = dir.path().join("huge.img");
        let err = RegionImage::open(&config.with_backup_file(&path)).err().unwrap();
        assert_eq!(err.code(), "E201");
        assert!(!path.exists());
    }

    #[test]
    fn backup_file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fs.img");
        let config = ImageConfig::anonymous(8192).with_backup_file(&path);

        {
            let mut image = RegionImage::open(&config).unwrap();
            let mut fs = image.mount().unwrap();
            fs.mkdir("/kept").unwrap();
        }
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 8192);

        // Size is taken from the file when it already exists.
        let mut image = RegionImage::open(&config.clone().with_size(65536)).unwrap();
        assert_eq!(image.len(), 8192);
        let mut fs = image.mount().unwrap();
        assert_eq!(fs.readdir("/").unwrap(), vec!["kept"]);
    }

    #[test]
    fn backup_file_is_locked_while_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("locked.img");
        let config = ImageConfig::anonymous(4096).with_backup_file(&path);

        let _first = RegionImage::open(&config).unwrap();
        let err = RegionImage::open(&config).err().unwrap();
        assert_eq!(err.code(), "E301");
    }
}
