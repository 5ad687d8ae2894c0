use crate::artifacts::diff::rename::SimilarityScorer;
use bitflags::bitflags;
use std::path::{Path, PathBuf};
use std::rc::Rc;

pub const DEFAULT_CONTEXT_LINES: usize = 3;
pub const DEFAULT_RENAME_THRESHOLD: u8 = 50;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct DiffFilter: u32 {
        const ADDED = 0b00001;
        const DELETED = 0b00010;
        const MODIFIED = 0b00100;
        const RENAMED = 0b01000;
        const TYPECHANGE = 0b10000;
    }
}

impl DiffFilter {
    /// Parse a `--diff-filter` style selection such as `AM`
    pub fn try_parse(s: &str) -> Option<Self> {
        let mut filter = Self::empty();

        for c in s.chars() {
            match c {
                'A' => filter |= Self::ADDED,
                'D' => filter |= Self::DELETED,
                'M' => filter |= Self::MODIFIED,
                'R' => filter |= Self::RENAMED,
                'T' => filter |= Self::TYPECHANGE,
                _ => return None,
            }
        }

        Some(filter)
    }
}

impl Default for DiffFilter {
    fn default() -> Self {
        Self::all()
    }
}

/// Rename pairing between deleted and added files
#[derive(Debug, Clone)]
pub struct RenameDetection {
    pub scorer: Rc<dyn SimilarityScorer>,
    /// Minimum similarity, in percent, for a pair to count as a rename
    pub threshold: u8,
}

impl RenameDetection {
    pub fn new(scorer: Rc<dyn SimilarityScorer>) -> Self {
        RenameDetection {
            scorer,
            threshold: DEFAULT_RENAME_THRESHOLD,
        }
    }

    pub fn with_threshold(mut self, threshold: u8) -> Self {
        self.threshold = threshold.min(100);
        self
    }
}

#[derive(Debug, Clone)]
pub struct DiffOptions {
    pub context_lines: usize,
    pub include_unmodified: bool,
    /// Workspace snapshots also pick up files the index does not track
    pub include_untracked: bool,
    /// Classify paths only, without producing hunks
    pub skip_hunks: bool,
    pub filter: DiffFilter,
    /// Only paths equal to or below one of these prefixes are reported
    pub paths: Vec<PathBuf>,
    pub renames: Option<RenameDetection>,
}

impl Default for DiffOptions {
    fn default() -> Self {
        DiffOptions {
            context_lines: DEFAULT_CONTEXT_LINES,
            include_unmodified: false,
            include_untracked: false,
            skip_hunks: false,
            filter: DiffFilter::default(),
            paths: Vec::new(),
            renames: None,
        }
    }
}

impl DiffOptions {
    pub fn with_context_lines(mut self, context_lines: usize) -> Self {
        self.context_lines = context_lines;
        self
    }

    pub fn with_paths(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        self.paths = paths.into_iter().collect();
        self
    }

    pub fn with_filter(mut self, filter: DiffFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_renames(mut self, renames: RenameDetection) -> Self {
        self.renames = Some(renames);
        self
    }

    /// Whether `path` is selected by the path prefixes
    ///
    /// Directories are also selected when a prefix lies below them, so the
    /// walk can reach it.
    pub fn selects(&self, path: &Path, is_tree: bool) -> bool {
        self.paths.is_empty()
            || self
                .paths
                .iter()
                .any(|prefix| path.starts_with(prefix) || (is_tree && prefix.starts_with(path)))
    }
}

/// Where a diff is delivered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffOutput {
    Structured,
    Text,
    /// Unified patch written to this file, replacing it
    File(PathBuf),
}
