//! Zero-context diff parsing for conflict prediction.
//!
//! `git diff -U0 base tip` reports every hunk with its position in the
//! *base* file. Two diffs that share a base therefore describe their edits in
//! the same coordinate space, which is what makes overlap checks meaningful.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

static HUNK_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@").expect("valid hunk regex")
});

/// Inclusive line span in the base file touched by one hunk.
///
/// A pure insertion (`-N,0`) is recorded as the single line `N` it follows;
/// git treats an insertion next to another side's edit as a conflict, so
/// anchoring it there keeps adjacency checks honest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LineRange {
    pub start: u32,
    pub end: u32,
}

impl LineRange {
    pub fn new(start: u32, count: u32) -> Self {
        if count == 0 {
            Self { start, end: start }
        } else {
            Self {
                start,
                end: start + count - 1,
            }
        }
    }

    /// Whether the spans overlap or sit on adjacent lines.
    pub fn touches(&self, other: &LineRange) -> bool {
        self.start <= other.end.saturating_add(1) && other.start <= self.end.saturating_add(1)
    }

    /// Number of untouched lines between two disjoint spans (0 when they touch).
    pub fn gap(&self, other: &LineRange) -> u32 {
        if self.touches(other) {
            0
        } else if self.end < other.start {
            other.start - self.end - 1
        } else {
            self.start - other.end - 1
        }
    }

    pub fn union(&self, other: &LineRange) -> LineRange {
        LineRange {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl std::fmt::Display for LineRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.start == self.end {
            write!(f, "line {}", self.start)
        } else {
            write!(f, "lines {}-{}", self.start, self.end)
        }
    }
}

/// Per-file summary of one side's changes since the merge base.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileDiff {
    pub path: String,
    pub hunks: Vec<LineRange>,
    pub binary: bool,
    pub added: bool,
    pub deleted: bool,
}

impl FileDiff {
    /// Parse `git diff --no-renames -U0` output into per-file summaries keyed by path.
    pub fn parse_zero_context(output: &str) -> BTreeMap<String, FileDiff> {
        let mut files = BTreeMap::new();
        let mut current: Option<FileDiff> = None;

        for line in output.lines() {
            if let Some(rest) = line.strip_prefix("diff --git ") {
                if let Some(done) = current.take() {
                    files.insert(done.path.clone(), done);
                }
                current = Some(FileDiff {
                    path: path_from_header(rest).unwrap_or_default(),
                    ..FileDiff::default()
                });
                continue;
            }

            let Some(file) = current.as_mut() else {
                continue;
            };

            if line.starts_with("new file mode") {
                file.added = true;
            } else if line.starts_with("deleted file mode") {
                file.deleted = true;
            } else if line.starts_with("Binary files ") {
                file.binary = true;
            } else if file.hunks.is_empty()
                && let Some(path) = line
                    .strip_prefix("--- a/")
                    .or_else(|| line.strip_prefix("+++ b/"))
            {
                // Hunk bodies can contain lines that look like file headers
                file.path = path.trim_end_matches('\t').to_string();
            } else if let Some(caps) = HUNK_HEADER.captures(line) {
                let start = caps[1].parse().unwrap_or(0);
                let count = caps.get(2).map_or(Ok(1), |m| m.as_str().parse()).unwrap_or(1);
                file.hunks.push(LineRange::new(start, count));
            }
        }

        if let Some(done) = current {
            files.insert(done.path.clone(), done);
        }
        files.remove("");
        files
    }
}

/// Recover the path from `a/<path> b/<path>` when both sides are identical,
/// which always holds with renames disabled.
fn path_from_header(rest: &str) -> Option<String> {
    let len = rest.len();
    if len < 5 || !rest.starts_with("a/") {
        return None;
    }
    let path_len = (len - 5) / 2;
    let path = rest.get(2..2 + path_len)?;
    let tail = rest.get(2 + path_len..)?;
    (tail.strip_prefix(" b/") == Some(path)).then(|| path.to_string())
}
