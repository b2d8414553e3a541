//! Shared, serialized access to one image.
//!
//! The filesystem core assumes a single writer. A [`Mount`] enforces that
//! across threads by funnelling every call through one mutex.

use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use crate::fs::FileSystem;
use crate::image::{ImageConfig, RegionImage};
use parking_lot::Mutex;
use std::sync::Arc;

/// A cloneable handle to a mounted image.
#[derive(Clone)]
pub struct Mount {
    image: Arc<Mutex<RegionImage>>,
    clock: Arc<dyn Clock>,
}

impl Mount {
    /// Share an open image, stamping with the system clock.
    pub fn new(image: RegionImage) -> Self {
        Self::with_clock(image, Arc::new(SystemClock))
    }

    /// Share an open image with a custom clock.
    pub fn with_clock(image: RegionImage, clock: Arc<dyn Clock>) -> Self {
        Self {
            image: Arc::new(Mutex::new(image)),
            clock,
        }
    }

    /// Open the image described by `config` and share it.
    pub fn open(config: &ImageConfig) -> Result<Self> {
        RegionImage::open(config).map(Self::new)
    }

    /// Run `f` against the filesystem while holding the image lock.
    ///
    /// The image is flushed afterwards when it was opened with
    /// `sync_on_write`, whether or not `f` succeeded. An error from `f` takes
    /// precedence over a flush failure.
    pub fn with_fs<T>(
        &self,
        f: impl FnOnce(&mut FileSystem<'_, Arc<dyn Clock>>) -> Result<T>,
    ) -> Result<T> {
        let mut image = self.image.lock();
        let sync = image.sync_on_write();
        let result = image
            .mount_with_clock(Arc::clone(&self.clock))
            .and_then(|mut fs| f(&mut fs));
        if !sync {
            return result;
        }
        settle(result, image.flush())
    }

    /// Flush the image to its backup file.
    pub fn flush(&self) -> Result<()> {
        self.image.lock().flush()
    }

    /// Image length in bytes.
    pub fn len(&self) -> u64 {
        self.image.lock().len()
    }

    /// Check if the image has no bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Combine an operation result with the flush that followed it.
fn settle<T>(result: Result<T>, flushed: Result<()>) -> Result<T> {
    match (result, flushed) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(flush)) => {
            tracing::warn!(error = %flush, "Failed to flush image after failed operation");
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FsError;
    use std::thread;

    #[test]
    fn concurrent_callers_are_serialized() {
        let mount = Mount::open(&ImageConfig::anonymous(256 * 1024)).unwrap();
        mount.with_fs(|fs| fs.mkdir("/t")).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let mount = mount.clone();
                thread::spawn(move || {
                    for i in 0..10 {
                        let path = format!("/t/w{}-{}", worker, i);
                        mount
                            .with_fs(|fs| {
                                fs.mknod(&path)?;
                                fs.write(&path, path.as_bytes(), 0)
                            })
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let names = mount.with_fs(|fs| fs.readdir("/t")).unwrap();
        assert_eq!(names.len(), 40);
        let report = mount.with_fs(|fs| fs.check()).unwrap();
        assert!(report.is_consistent(), "{:?}", report);
    }

    #[test]
    fn operation_error_wins_over_flush_error() {
        let flush_error = || {
            Err(FsError::Io {
                path: "fs.img".into(),
                cause: "disk full".to_string(),
            })
        };

        let err = settle::<()>(Err(FsError::not_found("/a")), flush_error()).unwrap_err();
        assert_eq!(err.code(), "E001");

        let err = settle(Ok(5), flush_error()).unwrap_err();
        assert_eq!(err.code(), "E301");

        assert_eq!(settle(Ok(5), Ok(())).unwrap(), 5);
    }
}
