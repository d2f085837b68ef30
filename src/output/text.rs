//! Plain text output for terminals.

use std::fmt::Write as _;
use std::io::{self, Write};

use super::{format_size, CompareSummary, ScanSummary};
use crate::duplicates::{CrossMatch, DuplicateGroup, FileIndex};

/// Text rendering of a scan.
#[derive(Debug)]
pub struct TextOutput<'a> {
    groups: &'a [DuplicateGroup],
    summary: &'a ScanSummary,
}

impl<'a> TextOutput<'a> {
    /// Create a text renderer.
    #[must_use]
    pub fn new(groups: &'a [DuplicateGroup], summary: &'a ScanSummary) -> Self {
        Self { groups, summary }
    }

    /// Render groups followed by the summary.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (i, group) in self.groups.iter().enumerate() {
            let _ = writeln!(
                out,
                "Group {}: {} files, {} each ({})",
                i + 1,
                group.len(),
                format_size(group.size),
                group.hash.short()
            );
            for file in &group.files {
                let _ = writeln!(out, "  {}", file.path.display());
            }
            out.push('\n');
        }

        let s = self.summary;
        let _ = writeln!(
            out,
            "Scanned {}: {} files, {}",
            s.root.display(),
            s.total_files,
            format_size(s.total_size)
        );
        if s.duplicate_groups == 0 {
            out.push_str("Didn't find any duplicates.\n");
        } else {
            let _ = writeln!(
                out,
                "Found {} duplicate groups, {} duplicate files, {} reclaimable",
                s.duplicate_groups,
                s.duplicate_files,
                format_size(s.reclaimable_space)
            );
        }
        if s.scan_errors + s.failed_files > 0 {
            let _ = writeln!(
                out,
                "Skipped {} unreadable entries and {} unhashable files",
                s.scan_errors, s.failed_files
            );
        }
        if s.interrupted {
            out.push_str("Interrupted, results are partial.\n");
        }
        out
    }

    /// Write the rendering to `writer`.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(self.render().as_bytes())
    }
}

/// Text rendering of a comparison.
#[derive(Debug)]
pub struct CompareTextOutput<'a> {
    ours: &'a FileIndex,
    theirs: &'a FileIndex,
    matched: &'a CrossMatch,
    summary: &'a CompareSummary,
}

impl<'a> CompareTextOutput<'a> {
    /// Create a text renderer.
    #[must_use]
    pub fn new(
        ours: &'a FileIndex,
        theirs: &'a FileIndex,
        matched: &'a CrossMatch,
        summary: &'a CompareSummary,
    ) -> Self {
        Self {
            ours,
            theirs,
            matched,
            summary,
        }
    }

    /// Render pairs followed by the summary.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        let mut n = 0;
        for (size, by_digest) in self.matched.groups().iter().rev() {
            for (digest, pair) in by_digest {
                n += 1;
                let _ = writeln!(
                    out,
                    "Pair {}: {} each ({})",
                    n,
                    format_size(*size),
                    digest.short()
                );
                for (index, positions) in [(self.ours, &pair.ours), (self.theirs, &pair.theirs)] {
                    let _ = writeln!(out, "  {}:", index.name());
                    for record in positions.iter().filter_map(|&p| index.record(p)) {
                        let _ = writeln!(out, "    {}", record.path().display());
                    }
                }
                out.push('\n');
            }
        }

        let s = self.summary;
        if s.pairs == 0 {
            out.push_str("Didn't find any duplicates.\n");
        } else {
            let _ = writeln!(out, "Found {} shared files", s.pairs);
            let _ = writeln!(
                out,
                "{}: {} files, {}",
                self.ours.name(),
                s.ours_files,
                format_size(s.ours_bytes)
            );
            let _ = writeln!(
                out,
                "{}: {} files, {}",
                self.theirs.name(),
                s.theirs_files,
                format_size(s.theirs_bytes)
            );
        }
        if s.failed_files > 0 {
            let _ = writeln!(out, "Skipped {} unhashable files", s.failed_files);
        }
        if s.interrupted {
            out.push_str("Interrupted, results are partial.\n");
        }
        out
    }

    /// Write the rendering to `writer`.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(self.render().as_bytes())
    }
}
