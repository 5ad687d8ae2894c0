//! Line-level diff grouped into hunks
//!
//! Line numbers are 1-based. A hunk with no lines on one side (a pure
//! insertion or deletion) reports, as its start on that side, the number of
//! the line the change follows, which is 0 at the top of the file.

use crate::artifacts::diff::myers::{DiffAlgorithm, Edit, MyersDiff};
use bytes::Bytes;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOrigin {
    Context,
    Addition,
    Deletion,
}

impl LineOrigin {
    pub fn as_char(&self) -> char {
        match self {
            LineOrigin::Context => ' ',
            LineOrigin::Addition => '+',
            LineOrigin::Deletion => '-',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub origin: LineOrigin,
    pub old_lineno: Option<usize>,
    pub new_lineno: Option<usize>,
    /// Line content including its terminator, if it has one
    pub content: Bytes,
}

impl Line {
    pub fn has_newline(&self) -> bool {
        self.content.last() == Some(&b'\n')
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    pub old_start: usize,
    pub old_lines: usize,
    pub new_start: usize,
    pub new_lines: usize,
    /// Text after the closing `@@`; empty unless a caller supplies context
    pub header_text: String,
    pub lines: Vec<Line>,
}

impl Hunk {
    pub fn header(&self) -> String {
        let header = format!(
            "@@ -{},{} +{},{} @@",
            self.old_start, self.old_lines, self.new_start, self.new_lines
        );

        match self.header_text.is_empty() {
            true => header,
            false => format!("{header} {}", self.header_text),
        }
    }

    pub fn with_header_text(mut self, text: impl Into<String>) -> Self {
        self.header_text = text.into();
        self
    }

    pub fn additions(&self) -> usize {
        self.count(LineOrigin::Addition)
    }

    pub fn deletions(&self) -> usize {
        self.count(LineOrigin::Deletion)
    }

    fn count(&self, origin: LineOrigin) -> usize {
        self.lines.iter().filter(|line| line.origin == origin).count()
    }
}

impl fmt::Display for Hunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.header())
    }
}

/// Split content into lines, each keeping its `\n`
pub fn split_lines(content: &Bytes) -> Vec<Bytes> {
    let mut lines = Vec::new();
    let mut start = 0;

    for (i, byte) in content.iter().enumerate() {
        if *byte == b'\n' {
            lines.push(content.slice(start..=i));
            start = i + 1;
        }
    }
    if start < content.len() {
        lines.push(content.slice(start..));
    }

    lines
}

/// Diff two texts line by line, grouping changes into hunks
///
/// Changes separated by at most `2 * context_lines` unchanged lines share a
/// hunk.
pub fn diff_lines(old: &Bytes, new: &Bytes, context_lines: usize) -> Vec<Hunk> {
    let old_lines = split_lines(old);
    let new_lines = split_lines(new);
    let edits = MyersDiff::new(&old_lines, &new_lines).diff();

    group_edits(&edits, context_lines)
        .into_iter()
        .map(|(start, end)| build_hunk(&edits, start, end, &old_lines, &new_lines))
        .collect()
}

/// Ranges of `edits` covered by each hunk, context included
fn group_edits(edits: &[Edit], context_lines: usize) -> Vec<(usize, usize)> {
    let mut changes: Vec<(usize, usize)> = Vec::new();
    let mut i = 0;

    while i < edits.len() {
        if edits[i].is_equal() {
            i += 1;
            continue;
        }

        let start = i;
        while i < edits.len() && !edits[i].is_equal() {
            i += 1;
        }

        match changes.last_mut() {
            Some((_, end)) if start - *end <= 2 * context_lines => *end = i,
            _ => changes.push((start, i)),
        }
    }

    changes
        .into_iter()
        .map(|(start, end)| {
            (
                start.saturating_sub(context_lines),
                (end + context_lines).min(edits.len()),
            )
        })
        .collect()
}

fn build_hunk(
    edits: &[Edit],
    start: usize,
    end: usize,
    old_lines: &[Bytes],
    new_lines: &[Bytes],
) -> Hunk {
    // lines of each side consumed before the hunk
    let old_before = edits[..start].iter().filter(|e| !matches!(e, Edit::Insert { .. })).count();
    let new_before = edits[..start].iter().filter(|e| !matches!(e, Edit::Delete { .. })).count();

    let lines = edits[start..end]
        .iter()
        .map(|edit| match *edit {
            Edit::Equal { old, new } => Line {
                origin: LineOrigin::Context,
                old_lineno: Some(old + 1),
                new_lineno: Some(new + 1),
                content: old_lines[old].clone(),
            },
            Edit::Delete { old } => Line {
                origin: LineOrigin::Deletion,
                old_lineno: Some(old + 1),
                new_lineno: None,
                content: old_lines[old].clone(),
            },
            Edit::Insert { new } => Line {
                origin: LineOrigin::Addition,
                old_lineno: None,
                new_lineno: Some(new + 1),
                content: new_lines[new].clone(),
            },
        })
        .collect::<Vec<_>>();

    let old_count = lines.iter().filter(|line| line.old_lineno.is_some()).count();
    let new_count = lines.iter().filter(|line| line.new_lineno.is_some()).count();

    Hunk {
        old_start: if old_count > 0 { old_before + 1 } else { old_before },
        old_lines: old_count,
        new_start: if new_count > 0 { new_before + 1 } else { new_before },
        new_lines: new_count,
        header_text: String::new(),
        lines,
    }
}
