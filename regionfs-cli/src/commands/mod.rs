//! CLI command implementations.

pub mod data;
pub mod entry;
pub mod image;

use anyhow::{Context, Result};
use regionfs_core::{ImageConfig, Mount};
use std::path::Path;

/// Open an existing image for one command.
pub fn open(image: &Path) -> Result<Mount> {
    if !image.exists() {
        anyhow::bail!(
            "Image not found: {} (create one with `regionfs format`)",
            image.display()
        );
    }
    let config = ImageConfig::default().with_backup_file(image);
    Mount::open(&config).with_context(|| format!("Failed to open image: {}", image.display()))
}
