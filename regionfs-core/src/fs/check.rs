//! Whole-region consistency check.

use super::FileSystem;
use crate::alloc::AllocatorReport;
use crate::clock::Clock;
use crate::error::Result;
use crate::layout::{INODE_SIZE, InodeData, SPAN_HEADER_SIZE, Superblock};
use crate::namespace::{dir, file};
use crate::path;
use crate::types::RegionOffset;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// Result of [`FileSystem::check`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckReport {
    /// Allocator-level findings.
    pub allocator: AllocatorReport,
    /// Directories visited, root included.
    pub directories: u64,
    /// Regular files visited.
    pub files: u64,
    /// Sum of all file lengths.
    pub file_bytes: u64,
    /// Namespace-level problems, empty when consistent.
    pub problems: Vec<String>,
}

impl CheckReport {
    /// Check if neither the allocator nor the namespace reported a problem.
    pub fn is_consistent(&self) -> bool {
        self.allocator.is_consistent() && self.problems.is_empty()
    }
}

impl<C: Clock> FileSystem<'_, C> {
    /// Walk the allocator and the whole tree and verify every invariant.
    ///
    /// Checks child array sizing, block chain lengths against file sizes,
    /// and that the set of allocated spans is exactly the set referenced from
    /// the tree, so leaks and dangling references are both reported.
    pub fn check(&self) -> Result<CheckReport> {
        let mut report = CheckReport {
            allocator: self.arena.check(),
            ..Default::default()
        };
        if !report.allocator.is_consistent() {
            return Ok(report);
        }

        let mut referenced = BTreeSet::new();
        let root = Superblock::read_root(self.arena.region())?;
        if !root.is_null() {
            referenced.insert(root);
            self.check_tree(root, &mut referenced, &mut report)?;
        }

        let allocated: BTreeSet<RegionOffset> = self
            .arena
            .spans()?
            .iter()
            .filter(|span| !span.free)
            .map(|span| span.payload())
            .collect();
        for leaked in allocated.difference(&referenced) {
            report
                .problems
                .push(format!("Allocation at {} is not referenced", leaked));
        }
        for dangling in referenced.difference(&allocated) {
            report
                .problems
                .push(format!("Reference to {} is not an allocation", dangling));
        }

        if !report.is_consistent() {
            tracing::warn!(problems = report.problems.len(), "Consistency check failed");
        }
        Ok(report)
    }

    fn check_tree(
        &self,
        root: RegionOffset,
        referenced: &mut BTreeSet<RegionOffset>,
        report: &mut CheckReport,
    ) -> Result<()> {
        let mut visited = HashSet::new();
        let mut pending = vec![("/".to_string(), root)];

        while let Some((dir_path, dir_at)) = pending.pop() {
            if !visited.insert(dir_at) {
                report
                    .problems
                    .push(format!("{}: directory reached twice", dir_path));
                continue;
            }
            report.directories += 1;

            let entries = match dir::entries(&self.arena, dir_at) {
                Ok(entries) => entries,
                Err(e) => {
                    report.problems.push(format!("{}: {}", dir_path, e));
                    continue;
                }
            };
            if let Some(first) = entries.first() {
                let children = first.at;
                if !referenced.insert(children) {
                    report
                        .problems
                        .push(format!("{}: child array is shared", dir_path));
                }
                let slack = self.arena.capacity(children)? - entries.len() as u64 * INODE_SIZE;
                if slack > SPAN_HEADER_SIZE {
                    report.problems.push(format!(
                        "{}: child array has {} bytes of slack",
                        dir_path, slack
                    ));
                }
            }

            let mut names = HashSet::new();
            for entry in entries {
                let inode = entry.inode;
                let child_path = if dir_path == "/" {
                    format!("/{}", inode.name)
                } else {
                    format!("{}/{}", dir_path, inode.name)
                };
                if let Err(e) = path::validate_name(&inode.name) {
                    report.problems.push(format!("{}: {}", child_path, e));
                }
                if !names.insert(inode.name.clone()) {
                    report
                        .problems
                        .push(format!("{}: duplicate name", child_path));
                }

                match inode.data {
                    InodeData::Directory { .. } => pending.push((child_path, entry.at)),
                    InodeData::File { size, first_block } => {
                        report.files += 1;
                        report.file_bytes += size;
                        self.check_chain(&child_path, size, first_block, referenced, report);
                    }
                }
            }
        }
        Ok(())
    }

    fn check_chain(
        &self,
        file_path: &str,
        size: u64,
        first: RegionOffset,
        referenced: &mut BTreeSet<RegionOffset>,
        report: &mut CheckReport,
    ) {
        let chain = match file::blocks(&self.arena, first) {
            Ok(chain) => chain,
            Err(e) => {
                report.problems.push(format!("{}: {}", file_path, e));
                return;
            }
        };

        let mut total = 0u64;
        for (record, block) in chain {
            total = total.saturating_add(block.block_size);
            referenced.insert(record);
            referenced.insert(block.data);
            match self.arena.capacity(block.data) {
                Ok(capacity) if capacity >= block.block_size => {}
                Ok(capacity) => report.problems.push(format!(
                    "{}: block at {} holds {} bytes in a {} byte allocation",
                    file_path, record, block.block_size, capacity
                )),
                Err(e) => report.problems.push(format!("{}: {}", file_path, e)),
            }
        }
        if total != size {
            report.problems.push(format!(
                "{}: blocks hold {} bytes, size is {}",
                file_path, total, size
            ));
        }
    }
}
