//! File content commands.

use anyhow::{Context, Result};
use regionfs_core::FsError;
use std::io::Write;
use std::path::Path;

/// Copy a host file into the image, replacing any existing content.
pub fn put(image: &Path, host: &Path, target: &str) -> Result<()> {
    let data = std::fs::read(host)
        .with_context(|| format!("Failed to read host file: {}", host.display()))?;
    let mount = super::open(image)?;

    let written = mount
        .with_fs(|fs| {
            match fs.mknod(target) {
                Ok(()) | Err(FsError::AlreadyExists { .. }) => {}
                Err(e) => return Err(e),
            }
            fs.truncate(target, 0)?;
            fs.write(target, &data, 0)
        })
        .with_context(|| format!("Failed to write {}", target))?;

    tracing::info!(host = %host.display(), path = %target, bytes = written, "Copied file into image");
    println!("{} bytes written to {}", written, target);
    Ok(())
}

/// Write a file's content to stdout.
pub fn cat(image: &Path, target: &str, offset: u64) -> Result<()> {
    let mount = super::open(image)?;
    let data = mount.with_fs(|fs| {
        let size = fs.getattr(target, 0, 0)?.size;
        let len = usize::try_from(size.saturating_sub(offset)).map_err(|_| FsError::FileTooLarge {
            path: target.to_string(),
        })?;
        let mut buf = vec![0u8; len];
        let n = fs.read(target, &mut buf, offset)?;
        buf.truncate(n);
        Ok(buf)
    })?;

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&data)?;
    stdout.flush()?;
    Ok(())
}

/// Set a file's length.
pub fn truncate(image: &Path, target: &str, len: u64) -> Result<()> {
    let mount = super::open(image)?;
    mount
        .with_fs(|fs| fs.truncate(target, len))
        .with_context(|| format!("Failed to truncate {}", target))?;
    tracing::info!(path = %target, len, "Truncated file");
    Ok(())
}
