//! Integration tests for the filesystem operations.
//!
//! Each test mounts a fresh zeroed region, drives the public operations and
//! finishes with a full consistency check.

use regionfs_core::prelude::*;
use std::sync::Arc;
use std::time::Duration;

fn assert_consistent<C: Clock>(fs: &FileSystem<'_, C>) {
    let report = fs.check().unwrap();
    assert!(report.is_consistent(), "{:#?}", report);
}

#[test]
fn test_write_then_read_in_subdirectory() {
    let mut region = vec![0u8; 64 * 1024];
    let mut fs = FileSystem::mount(&mut region).unwrap();

    fs.mkdir("/a").unwrap();
    fs.mknod("/a/b").unwrap();
    assert_eq!(fs.write("/a/b", b"hello", 0).unwrap(), 5);

    let mut buf = [0u8; 5];
    assert_eq!(fs.read("/a/b", &mut buf, 0).unwrap(), 5);
    assert_eq!(&buf, b"hello");
    assert_consistent(&fs);
}

#[test]
fn test_large_round_trip_across_many_writes() {
    let mut region = vec![0u8; 256 * 1024];
    let mut fs = FileSystem::mount(&mut region).unwrap();
    fs.mknod("/blob").unwrap();

    let data: Vec<u8> = (0..20_000u32).map(|i| (i * 31 % 251) as u8).collect();
    for (i, chunk) in data.chunks(777).enumerate() {
        fs.write("/blob", chunk, (i * 777) as u64).unwrap();
    }

    let mut out = vec![0u8; data.len()];
    assert_eq!(fs.read("/blob", &mut out, 0).unwrap(), data.len());
    assert_eq!(out, data);
    assert_eq!(fs.getattr("/blob", 0, 0).unwrap().size, data.len() as u64);
    assert_consistent(&fs);
}

#[test]
fn test_rmdir_requires_empty_directory() {
    let mut region = vec![0u8; 16 * 1024];
    let mut fs = FileSystem::mount(&mut region).unwrap();

    fs.mkdir("/d").unwrap();
    fs.mknod("/d/f").unwrap();
    assert!(matches!(fs.rmdir("/d"), Err(FsError::NotEmpty { .. })));

    fs.unlink("/d/f").unwrap();
    fs.rmdir("/d").unwrap();
    assert!(matches!(fs.getattr("/d", 0, 0), Err(FsError::NotFound { .. })));
    assert!(fs.readdir("/").unwrap().is_empty());
    assert_consistent(&fs);
}

#[test]
fn test_error_kinds() {
    let mut region = vec![0u8; 16 * 1024];
    let mut fs = FileSystem::mount(&mut region).unwrap();
    fs.mkdir("/d").unwrap();
    fs.mknod("/f").unwrap();

    assert!(matches!(fs.mkdir("/d"), Err(FsError::AlreadyExists { .. })));
    assert!(matches!(fs.mknod("/f"), Err(FsError::AlreadyExists { .. })));
    assert!(matches!(fs.mkdir("/"), Err(FsError::AlreadyExists { .. })));
    assert!(matches!(fs.mknod("/missing/f"), Err(FsError::NotFound { .. })));
    assert!(matches!(fs.mknod("/f/child"), Err(FsError::NotADirectory { .. })));
    assert!(matches!(fs.readdir("/f"), Err(FsError::NotADirectory { .. })));
    assert!(matches!(fs.unlink("/d"), Err(FsError::IsADirectory { .. })));
    assert!(matches!(fs.rmdir("/f"), Err(FsError::NotADirectory { .. })));
    assert!(matches!(fs.rmdir("/"), Err(FsError::Busy { .. })));
    assert!(matches!(fs.truncate("/d", 1), Err(FsError::IsADirectory { .. })));
    assert!(matches!(fs.write("/d", b"x", 0), Err(FsError::IsADirectory { .. })));
    assert!(matches!(fs.open("/nope"), Err(FsError::NotFound { .. })));
    assert!(matches!(fs.mkdir("relative"), Err(FsError::InvalidPath { .. })));
    assert!(matches!(
        fs.write("/f", b"x", u64::MAX),
        Err(FsError::FileTooLarge { .. })
    ));

    let long = format!("/{}", "n".repeat(256));
    assert!(matches!(fs.mknod(&long), Err(FsError::NameTooLong { .. })));
    let longest = format!("/{}", "n".repeat(255));
    fs.mknod(&longest).unwrap();
    fs.open(&longest).unwrap();
    assert_consistent(&fs);
}

#[test]
fn test_getattr_reports_kinds_and_links() {
    let mut region = vec![0u8; 32 * 1024];
    let mut fs = FileSystem::mount(&mut region).unwrap();
    fs.mkdir("/d").unwrap();
    fs.mkdir("/d/x").unwrap();
    fs.mkdir("/d/y").unwrap();
    fs.mknod("/d/f").unwrap();
    fs.write("/d/f", b"12345678", 0).unwrap();

    let dir = fs.getattr("/d", 501, 20).unwrap();
    assert_eq!(dir.kind, FileKind::Directory);
    assert_eq!(dir.mode, libc::S_IFDIR as u32 | 0o755);
    assert_eq!(dir.nlink, 4);
    assert_eq!((dir.uid, dir.gid), (501, 20));

    let file = fs.getattr("//d///f", 0, 0).unwrap();
    assert_eq!(file.kind, FileKind::RegularFile);
    assert_eq!(file.mode, libc::S_IFREG as u32 | 0o755);
    assert_eq!(file.nlink, 1);
    assert_eq!(file.size, 8);

    assert_eq!(fs.getattr("/", 0, 0).unwrap().nlink, 3);
}

#[test]
fn test_rename_to_itself_is_a_no_op() {
    let mut region = vec![0u8; 16 * 1024];
    let mut fs = FileSystem::mount(&mut region).unwrap();
    fs.mkdir("/d").unwrap();
    fs.mknod("/d/f").unwrap();
    fs.write("/d/f", b"same", 0).unwrap();
    let before = fs.check().unwrap();

    fs.rename("/d/f", "/d/f").unwrap();
    fs.rename("/d", "/d/").unwrap();

    assert_eq!(fs.readdir("/d").unwrap(), vec!["f"]);
    let after = fs.check().unwrap();
    assert_eq!(before, after);
    assert!(matches!(fs.rename("/nope", "/nope"), Err(FsError::NotFound { .. })));
}

#[test]
fn test_rename_moves_between_directories() {
    let mut region = vec![0u8; 32 * 1024];
    let mut fs = FileSystem::mount(&mut region).unwrap();
    fs.mkdir("/src").unwrap();
    fs.mkdir("/dst").unwrap();
    fs.mkdir("/src/sub").unwrap();
    fs.mknod("/src/sub/f").unwrap();
    fs.write("/src/sub/f", b"payload", 0).unwrap();

    fs.rename("/src/sub", "/dst/moved").unwrap();

    assert!(fs.readdir("/src").unwrap().is_empty());
    assert_eq!(fs.readdir("/dst").unwrap(), vec!["moved"]);
    let mut buf = [0u8; 7];
    fs.read("/dst/moved/f", &mut buf, 0).unwrap();
    assert_eq!(&buf, b"payload");
    assert_consistent(&fs);
}

#[test]
fn test_rename_replaces_compatible_destination() {
    let mut region = vec![0u8; 32 * 1024];
    let mut fs = FileSystem::mount(&mut region).unwrap();
    fs.mknod("/a").unwrap();
    fs.write("/a", b"new", 0).unwrap();
    fs.mknod("/b").unwrap();
    fs.write("/b", b"old contents", 0).unwrap();

    fs.rename("/a", "/b").unwrap();
    assert_eq!(fs.readdir("/").unwrap(), vec!["b"]);
    assert_eq!(fs.getattr("/b", 0, 0).unwrap().size, 3);

    fs.mkdir("/full").unwrap();
    fs.mknod("/full/x").unwrap();
    fs.mkdir("/empty").unwrap();
    fs.mkdir("/mover").unwrap();
    fs.mknod("/mover/y").unwrap();

    assert!(matches!(fs.rename("/mover", "/full"), Err(FsError::NotEmpty { .. })));
    assert!(matches!(fs.rename("/b", "/empty"), Err(FsError::IsADirectory { .. })));
    assert!(matches!(fs.rename("/mover", "/b"), Err(FsError::NotADirectory { .. })));

    fs.rename("/mover", "/empty").unwrap();
    assert_eq!(fs.readdir("/empty").unwrap(), vec!["y"]);
    assert!(matches!(fs.open("/mover"), Err(FsError::NotFound { .. })));
    assert_consistent(&fs);
}

#[test]
fn test_rename_into_own_subtree_is_rejected() {
    let mut region = vec![0u8; 16 * 1024];
    let mut fs = FileSystem::mount(&mut region).unwrap();
    fs.mkdir("/a").unwrap();
    fs.mkdir("/a/b").unwrap();

    assert!(matches!(fs.rename("/a", "/a/b/c"), Err(FsError::InvalidPath { .. })));
    assert!(matches!(fs.rename("/", "/x"), Err(FsError::Busy { .. })));
    assert_eq!(fs.readdir("/a").unwrap(), vec!["b"]);
    assert_consistent(&fs);
}

#[test]
fn test_truncate_monotonicity() {
    let mut region = vec![0u8; 32 * 1024];
    let mut fs = FileSystem::mount(&mut region).unwrap();
    fs.mknod("/f").unwrap();
    fs.write("/f", b"abcdef", 0).unwrap();

    for len in [10u64, 3, 3, 4000, 0, 17] {
        let old = fs.getattr("/f", 0, 0).unwrap().size;
        fs.truncate("/f", len).unwrap();
        assert_eq!(fs.getattr("/f", 0, 0).unwrap().size, len);

        if len > old {
            let mut grown = vec![0xffu8; (len - old) as usize];
            fs.read("/f", &mut grown, old).unwrap();
            assert!(grown.iter().all(|b| *b == 0));
        }
    }
    assert_consistent(&fs);
}

#[test]
fn test_sparse_write_fills_hole_with_zeros() {
    let mut region = vec![0u8; 16 * 1024];
    let mut fs = FileSystem::mount(&mut region).unwrap();
    fs.mknod("/s").unwrap();
    fs.write("/s", b"end", 1000).unwrap();

    let mut buf = vec![0xaau8; 1003];
    assert_eq!(fs.read("/s", &mut buf, 0).unwrap(), 1003);
    assert!(buf[..1000].iter().all(|b| *b == 0));
    assert_eq!(&buf[1000..], b"end");
}

#[test]
fn test_exhaustion_leaves_region_consistent() {
    let mut region = vec![0u8; 8 * 1024];
    let mut fs = FileSystem::mount(&mut region).unwrap();

    let mut created = 0;
    let err = loop {
        match fs.mknod(&format!("/f{}", created)) {
            Ok(()) => created += 1,
            Err(e) => break e,
        }
    };
    assert!(matches!(err, FsError::NoSpace { .. }));
    assert_eq!(err.errno(), libc::ENOSPC);
    assert_eq!(fs.readdir("/").unwrap().len(), created);

    let report = fs.check().unwrap();
    assert!(report.is_consistent(), "{:#?}", report);
    assert_eq!(
        report.allocator.free_bytes + report.allocator.used_bytes,
        report.allocator.heap_size
    );

    // Space comes back after removal.
    fs.unlink("/f0").unwrap();
    fs.mknod("/again").unwrap();
    assert_consistent(&fs);
}

#[test]
fn test_failed_write_keeps_file_intact() {
    let mut region = vec![0u8; 4096];
    let mut fs = FileSystem::mount(&mut region).unwrap();
    fs.mknod("/f").unwrap();
    fs.write("/f", b"keep", 0).unwrap();

    let err = fs.write("/f", &[1u8; 8192], 4).unwrap_err();
    assert!(err.is_space_error());

    let mut buf = [0u8; 8];
    assert_eq!(fs.read("/f", &mut buf, 0).unwrap(), 4);
    assert_eq!(&buf[..4], b"keep");
    assert_consistent(&fs);
}

#[test]
fn test_utimens_and_clock_policy() {
    let clock = Arc::new(MockClock::fixed(Timespec::new(1_700_000_000, 0)));
    let mut region = vec![0u8; 16 * 1024];
    let mut fs = FileSystem::mount_with_clock(&mut region, clock.clone()).unwrap();

    fs.mknod("/f").unwrap();
    clock.advance(Duration::from_secs(60));
    fs.truncate("/f", 10).unwrap();
    let attr = fs.getattr("/f", 0, 0).unwrap();
    assert_eq!(attr.atime, Timespec::new(1_700_000_000, 0));
    assert_eq!(attr.mtime, Timespec::new(1_700_000_060, 0));

    let atime = Timespec::new(42, 7);
    let mtime = Timespec::new(-5, 999_999_999);
    fs.utimens("/f", atime, mtime).unwrap();
    let attr = fs.getattr("/f", 0, 0).unwrap();
    assert_eq!((attr.atime, attr.mtime), (atime, mtime));

    fs.utimens("/", atime, atime).unwrap();
    assert_eq!(fs.getattr("/", 0, 0).unwrap().mtime, atime);
}

#[test]
fn test_statfs_tracks_free_space() {
    let mut region = vec![0u8; 128 * 1024];
    let mut fs = FileSystem::mount(&mut region).unwrap();
    let empty = fs.statfs().unwrap();

    fs.mknod("/big").unwrap();
    fs.truncate("/big", 32 * 1024).unwrap();
    let used = fs.statfs().unwrap();
    assert!(used.blocks_free <= empty.blocks_free - 32);
    assert_eq!(used.blocks, empty.blocks);

    fs.unlink("/big").unwrap();
    let freed = fs.statfs().unwrap();
    assert!(freed.blocks_free >= used.blocks_free + 32);
}

#[test]
fn test_directory_arrays_stay_tight() {
    let mut region = vec![0u8; 64 * 1024];
    let mut fs = FileSystem::mount(&mut region).unwrap();
    fs.mkdir("/d").unwrap();
    for i in 0..20 {
        fs.mknod(&format!("/d/{}", i)).unwrap();
    }
    for i in (0..20).step_by(3) {
        fs.unlink(&format!("/d/{}", i)).unwrap();
    }

    let mut names = fs.readdir("/d").unwrap();
    names.sort();
    let mut expected: Vec<String> = (0..20)
        .filter(|i| i % 3 != 0)
        .map(|i| i.to_string())
        .collect();
    expected.sort();
    assert_eq!(names, expected);
    // check() verifies every child array is sized to its child count.
    assert_consistent(&fs);
}
