//! Line-level diff of one file between two snapshots.
//!
//! Uses the `similar` crate (Myers diff) to produce hunks with three lines of
//! context. Content that is not UTF-8 is summarised as a binary change.

use std::fmt::Write as _;

use similar::{ChangeTag, TextDiff};

const CONTEXT_LINES: usize = 3;

/// The result of diffing two versions of a file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlobDiff {
    pub hunks: Vec<DiffHunk>,
    /// Either side was not valid UTF-8.
    pub binary: bool,
}

impl BlobDiff {
    /// Returns `true` if the two versions are identical.
    pub fn is_empty(&self) -> bool {
        self.hunks.is_empty()
    }

    pub fn additions(&self) -> usize {
        self.count(|l| matches!(l, DiffLine::Added(_)))
    }

    pub fn deletions(&self) -> usize {
        self.count(|l| matches!(l, DiffLine::Removed(_)))
    }

    fn count(&self, pred: impl Fn(&DiffLine) -> bool) -> usize {
        self.hunks.iter().flat_map(|h| &h.lines).filter(|l| pred(l)).count()
    }

    /// Render as a unified diff with `a/` and `b/` headers.
    pub fn to_unified(&self, path: &str) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "--- a/{path}");
        let _ = writeln!(out, "+++ b/{path}");
        for hunk in &self.hunks {
            let _ = writeln!(
                out,
                "@@ -{},{} +{},{} @@",
                hunk.old_start, hunk.old_count, hunk.new_start, hunk.new_count
            );
            for line in &hunk.lines {
                let (sign, text) = match line {
                    DiffLine::Context(t) => (' ', t),
                    DiffLine::Added(t) => ('+', t),
                    DiffLine::Removed(t) => ('-', t),
                };
                let _ = writeln!(out, "{sign}{text}");
            }
        }
        out
    }
}

/// A contiguous region of changes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiffHunk {
    /// 1-based start line in the old content.
    pub old_start: usize,
    pub old_count: usize,
    /// 1-based start line in the new content.
    pub new_start: usize,
    pub new_count: usize,
    pub lines: Vec<DiffLine>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DiffLine {
    Context(String),
    Added(String),
    Removed(String),
}

/// Compute a line diff between two versions of a file.
pub fn diff_blobs(old: &[u8], new: &[u8]) -> BlobDiff {
    let (old_str, new_str) = match (std::str::from_utf8(old), std::str::from_utf8(new)) {
        (Ok(o), Ok(n)) => (o, n),
        _ => return binary_diff(old, new),
    };
    if old_str == new_str {
        return BlobDiff {
            hunks: Vec::new(),
            binary: false,
        };
    }

    let text_diff = TextDiff::from_lines(old_str, new_str);
    let hunks = text_diff
        .grouped_ops(CONTEXT_LINES)
        .iter()
        .map(|group| {
            let mut hunk = DiffHunk {
                old_start: group.first().map_or(0, |op| op.old_range().start) + 1,
                old_count: 0,
                new_start: group.first().map_or(0, |op| op.new_range().start) + 1,
                new_count: 0,
                lines: Vec::new(),
            };
            for op in group {
                for change in text_diff.iter_changes(op) {
                    let text = change.value().trim_end_matches('\n').to_string();
                    match change.tag() {
                        ChangeTag::Equal => {
                            hunk.old_count += 1;
                            hunk.new_count += 1;
                            hunk.lines.push(DiffLine::Context(text));
                        }
                        ChangeTag::Delete => {
                            hunk.old_count += 1;
                            hunk.lines.push(DiffLine::Removed(text));
                        }
                        ChangeTag::Insert => {
                            hunk.new_count += 1;
                            hunk.lines.push(DiffLine::Added(text));
                        }
                    }
                }
            }
            hunk
        })
        .collect();

    BlobDiff {
        hunks,
        binary: false,
    }
}

fn binary_diff(old: &[u8], new: &[u8]) -> BlobDiff {
    if old == new {
        return BlobDiff {
            hunks: Vec::new(),
            binary: true,
        };
    }
    let mut lines = Vec::new();
    if !old.is_empty() {
        lines.push(DiffLine::Removed(format!("(binary content, {} bytes)", old.len())));
    }
    if !new.is_empty() {
        lines.push(DiffLine::Added(format!("(binary content, {} bytes)", new.len())));
    }
    BlobDiff {
        hunks: vec![DiffHunk {
            old_start: 1,
            old_count: usize::from(!old.is_empty()),
            new_start: 1,
            new_count: usize::from(!new.is_empty()),
            lines,
        }],
        binary: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_content_no_diff() {
        let content = b"(kicad_sch\n  (version 20231120)\n)\n";
        let diff = diff_blobs(content, content);
        assert!(diff.is_empty());
        assert!(!diff.binary);
    }

    #[test]
    fn modification_shows_remove_and_add() {
        let diff = diff_blobs(b"a\nb\nc\n", b"a\nB\nc\n");
        assert_eq!(diff.additions(), 1);
        assert_eq!(diff.deletions(), 1);
        let hunk = &diff.hunks[0];
        assert_eq!((hunk.old_start, hunk.old_count), (1, 3));
        assert_eq!((hunk.new_start, hunk.new_count), (1, 3));
    }

    #[test]
    fn distant_changes_split_into_hunks() {
        let old: String = (0..40).map(|i| format!("line {i}\n")).collect();
        let new = old.replace("line 2\n", "LINE 2\n").replace("line 35\n", "LINE 35\n");
        let diff = diff_blobs(old.as_bytes(), new.as_bytes());
        assert_eq!(diff.hunks.len(), 2);
    }

    #[test]
    fn binary_content_is_summarised() {
        let diff = diff_blobs(&[0xff, 0xfe, 0x00], &[0xff, 0x00]);
        assert!(diff.binary);
        assert_eq!(diff.hunks.len(), 1);
        assert_eq!(diff.additions(), 1);
        assert_eq!(diff.deletions(), 1);
    }

    #[test]
    fn unified_rendering() {
        let diff = diff_blobs(b"x\n", b"y\n");
        let text = diff.to_unified("board.kicad_pcb");
        assert!(text.starts_with("--- a/board.kicad_pcb\n+++ b/board.kicad_pcb\n"));
        assert!(text.contains("@@ -1,1 +1,1 @@"));
        assert!(text.contains("-x\n"));
        assert!(text.contains("+y\n"));
    }
}
