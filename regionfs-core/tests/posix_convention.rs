//! Integration tests for the POSIX-style calling convention.

use regionfs_core::posix;
use regionfs_core::{FileAttr, FsStats, Timespec};

#[test]
fn test_scenario_through_entry_points() {
    let mut region = vec![0u8; 32 * 1024];
    let mut errno = 0;

    assert_eq!(posix::mkdir(&mut region, &mut errno, "/a"), 0);
    assert_eq!(posix::mknod(&mut region, &mut errno, "/a/b"), 0);
    assert_eq!(posix::open(&mut region, &mut errno, "/a/b"), 0);
    assert_eq!(posix::write(&mut region, &mut errno, "/a/b", b"hello", 0), 5);

    let mut buf = [0u8; 5];
    assert_eq!(posix::read(&mut region, &mut errno, "/a/b", &mut buf, 0), 5);
    assert_eq!(&buf, b"hello");
    assert_eq!(errno, 0);

    let mut names = Vec::new();
    assert_eq!(posix::readdir(&mut region, &mut errno, "/a", &mut names), 0);
    assert_eq!(names, vec!["b"]);

    let mut attr = FileAttr::default();
    assert_eq!(posix::getattr(&mut region, &mut errno, "/a/b", 7, 8, &mut attr), 0);
    assert_eq!(attr.size, 5);
    assert_eq!((attr.uid, attr.gid), (7, 8));

    assert_eq!(posix::truncate(&mut region, &mut errno, "/a/b", 2), 0);
    assert_eq!(posix::rename(&mut region, &mut errno, "/a/b", "/c"), 0);
    let times = [Timespec::new(1, 2), Timespec::new(3, 4)];
    assert_eq!(posix::utimens(&mut region, &mut errno, "/c", times), 0);
    assert_eq!(posix::getattr(&mut region, &mut errno, "/c", 0, 0, &mut attr), 0);
    assert_eq!((attr.size, attr.atime, attr.mtime), (2, times[0], times[1]));

    assert_eq!(posix::unlink(&mut region, &mut errno, "/c"), 0);
    assert_eq!(posix::rmdir(&mut region, &mut errno, "/a"), 0);

    let mut stats = FsStats::default();
    assert_eq!(posix::statfs(&mut region, &mut errno, &mut stats), 0);
    assert_eq!(stats.block_size, 1024);
    assert_eq!(stats.name_max, 255);
    assert_eq!(errno, 0);
}

fn check(status: i32, expected: i32, errno: i32) {
    assert_eq!(status, -1);
    assert_eq!(errno, expected);
}

#[test]
fn test_errno_values() {
    let mut region = vec![0u8; 16 * 1024];
    let mut errno = 0;
    posix::mkdir(&mut region, &mut errno, "/d");
    posix::mknod(&mut region, &mut errno, "/d/f");

    let s = posix::open(&mut region, &mut errno, "/missing");
    check(s, libc::ENOENT, errno);
    let s = posix::mkdir(&mut region, &mut errno, "/d");
    check(s, libc::EEXIST, errno);
    let s = posix::mknod(&mut region, &mut errno, "/d/f/x");
    check(s, libc::ENOTDIR, errno);
    let s = posix::unlink(&mut region, &mut errno, "/d");
    check(s, libc::EISDIR, errno);
    let s = posix::rmdir(&mut region, &mut errno, "/d");
    check(s, libc::ENOTEMPTY, errno);
    let s = posix::rmdir(&mut region, &mut errno, "/");
    check(s, libc::EBUSY, errno);
    let s = posix::mknod(&mut region, &mut errno, &format!("/{}", "x".repeat(300)));
    check(s, libc::ENAMETOOLONG, errno);
    let s = posix::rename(&mut region, &mut errno, "/d", "/d/sub");
    check(s, libc::EINVAL, errno);
    let s = posix::write(&mut region, &mut errno, "/d/f", &[0u8; 64 * 1024], 0);
    check(s as i32, libc::ENOSPC, errno);
    let s = posix::write(&mut region, &mut errno, "/d/f", b"x", i64::MAX);
    check(s as i32, libc::EFBIG, errno);
}

#[test]
fn test_bad_region_reports_efault() {
    let mut region = vec![0u8; 4096];
    let mut errno = 0;
    posix::mkdir(&mut region, &mut errno, "/d");
    // Unknown layout version.
    region[4] = 0xff;

    let mut stats = FsStats::default();
    assert_eq!(posix::statfs(&mut region, &mut errno, &mut stats), -1);
    assert_eq!(errno, libc::EFAULT);
}
