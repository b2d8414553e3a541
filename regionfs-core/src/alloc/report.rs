//! Span walking and allocator invariant checks.

use super::Arena;
use crate::error::{FsError, Result};
use crate::layout::{ALIGNMENT, SPAN_HEADER_SIZE, SpanHeader, Superblock};
use crate::types::RegionOffset;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One span found by walking the heap linearly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanInfo {
    /// Header offset.
    pub offset: RegionOffset,
    /// Total span size including the header.
    pub size: u64,
    /// Whether the span is on the free list.
    pub free: bool,
}

impl SpanInfo {
    /// Payload offset of the span.
    pub fn payload(&self) -> RegionOffset {
        RegionOffset::new(self.offset.as_u64() + SPAN_HEADER_SIZE)
    }
}

/// Result of an allocator consistency check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocatorReport {
    /// Usable heap bytes recorded in the superblock.
    pub heap_size: u64,
    /// Bytes in free spans.
    pub free_bytes: u64,
    /// Bytes in allocated spans.
    pub used_bytes: u64,
    /// Number of free spans.
    pub free_spans: usize,
    /// Number of allocated spans.
    pub used_spans: usize,
    /// Largest single payload currently available.
    pub largest_free: u64,
    /// Violated invariants, empty when consistent.
    pub problems: Vec<String>,
}

impl AllocatorReport {
    /// Check if no invariant was violated.
    pub fn is_consistent(&self) -> bool {
        self.problems.is_empty()
    }
}

impl Arena<'_> {
    /// Walk every span from the start of the heap.
    pub fn spans(&self) -> Result<Vec<SpanInfo>> {
        let mut free = BTreeSet::new();
        for entry in self.free_list() {
            free.insert(entry?.1);
        }

        let mut spans = Vec::new();
        let mut at = Superblock::heap_start();
        while at < self.heap_end {
            let header = SpanHeader::load(self.region(), at)?;
            let end = header
                .end(at)
                .filter(|end| *end <= self.heap_end)
                .ok_or_else(|| FsError::corrupted(at, "Span runs past heap end"))?;
            if header.size < SPAN_HEADER_SIZE || header.size % ALIGNMENT != 0 {
                return Err(FsError::corrupted(
                    at,
                    format!("Invalid span size {}", header.size),
                ));
            }
            spans.push(SpanInfo {
                offset: at,
                size: header.size,
                free: free.remove(&at),
            });
            at = end;
        }

        if let Some(stray) = free.first() {
            return Err(FsError::corrupted(
                *stray,
                "Free list entry is not on a span boundary",
            ));
        }
        Ok(spans)
    }

    /// Verify the allocator invariants.
    ///
    /// Structural damage that stops the walk is recorded as a problem rather
    /// than returned, so the report is always produced.
    pub fn check(&self) -> AllocatorReport {
        let mut report = AllocatorReport {
            heap_size: self.heap_size(),
            ..Default::default()
        };

        let spans = match self.spans() {
            Ok(spans) => spans,
            Err(e) => {
                report.problems.push(e.to_string());
                return report;
            }
        };

        let mut previous_free: Option<&SpanInfo> = None;
        for span in &spans {
            if span.free {
                report.free_bytes += span.size;
                report.free_spans += 1;
                report.largest_free = report.largest_free.max(span.size - SPAN_HEADER_SIZE);
                if let Some(prev) = previous_free {
                    report.problems.push(format!(
                        "Free spans at {} and {} are adjacent",
                        prev.offset, span.offset
                    ));
                }
                previous_free = Some(span);
            } else {
                report.used_bytes += span.size;
                report.used_spans += 1;
                previous_free = None;
            }
        }

        if report.free_bytes + report.used_bytes != report.heap_size {
            report.problems.push(format!(
                "Span sizes add up to {} bytes, heap is {}",
                report.free_bytes + report.used_bytes,
                report.heap_size
            ));
        }
        report
    }
}
