//! Image-level commands: format, df, check.

use anyhow::{Context, Result};
use regionfs_core::layout::MIN_REGION_SIZE;
use regionfs_core::{ImageConfig, Mount};
use std::path::Path;

/// Create a new image file and format it.
pub fn format(image: &Path, size: u64, force: bool) -> Result<()> {
    if size < MIN_REGION_SIZE {
        anyhow::bail!("Image size must be at least {} bytes", MIN_REGION_SIZE);
    }
    if image.exists() {
        if !force {
            anyhow::bail!(
                "Image already exists: {} (use --force to overwrite)",
                image.display()
            );
        }
        std::fs::remove_file(image)
            .with_context(|| format!("Failed to remove old image: {}", image.display()))?;
    }

    let config = ImageConfig::default()
        .with_size(size)
        .with_backup_file(image);
    let mount = Mount::open(&config)
        .with_context(|| format!("Failed to create image: {}", image.display()))?;
    let stats = mount.with_fs(|fs| {
        fs.getattr("/", 0, 0)?;
        fs.statfs()
    })?;
    mount.flush()?;

    tracing::info!(image = %image.display(), size, "Formatted image");
    println!(
        "Formatted {} ({} bytes, {} KiB free)",
        image.display(),
        mount.len(),
        stats.blocks_free
    );
    Ok(())
}

/// Show space usage.
pub fn df(image: &Path, json: bool) -> Result<()> {
    let mount = super::open(image)?;
    let stats = mount.with_fs(|fs| fs.statfs())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    let used = stats.blocks - stats.blocks_free.min(stats.blocks);
    let percent = if stats.blocks == 0 {
        0.0
    } else {
        used as f64 * 100.0 / stats.blocks as f64
    };
    println!("{:<24} {:>10} {:>10} {:>10} {:>5}", "Image", "1K-blocks", "Used", "Available", "Use%");
    println!(
        "{:<24} {:>10} {:>10} {:>10} {:>4.0}%",
        image.display(),
        stats.blocks,
        used,
        stats.blocks_available,
        percent
    );
    Ok(())
}

/// Verify the image and fail when it is inconsistent.
pub fn check(image: &Path, json: bool) -> Result<()> {
    let mount = super::open(image)?;
    let report = mount.with_fs(|fs| fs.check())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        let alloc = &report.allocator;
        println!("Directories:  {}", report.directories);
        println!("Files:        {}", report.files);
        println!("File bytes:   {}", report.file_bytes);
        println!(
            "Heap:         {} bytes ({} used in {} spans, {} free in {} spans)",
            alloc.heap_size, alloc.used_bytes, alloc.used_spans, alloc.free_bytes, alloc.free_spans
        );
        println!("Largest free: {} bytes", alloc.largest_free);
        for problem in alloc.problems.iter().chain(&report.problems) {
            println!("  ✗ {}", problem);
        }
    }

    if !report.is_consistent() {
        anyhow::bail!(
            "Image is inconsistent ({} problems)",
            report.allocator.problems.len() + report.problems.len()
        );
    }
    if !json {
        println!("✓ Image is consistent");
    }
    Ok(())
}
