//! Per-path differences between two snapshots

use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::diff::hunk::Hunk;
use crate::artifacts::diff::options::DiffFilter;
use crate::artifacts::diff::patch::Patch;
use crate::artifacts::diff::stat::DiffStat;
use crate::artifacts::objects::object_id::ObjectId;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeltaStatus {
    Added,
    Deleted,
    Modified,
    Renamed,
    Typechange,
    Unmodified,
}

impl DeltaStatus {
    pub fn status_char(&self) -> char {
        match self {
            DeltaStatus::Added => 'A',
            DeltaStatus::Deleted => 'D',
            DeltaStatus::Modified => 'M',
            DeltaStatus::Renamed => 'R',
            DeltaStatus::Typechange => 'T',
            DeltaStatus::Unmodified => ' ',
        }
    }

    pub fn matches_filter(&self, filter: DiffFilter) -> bool {
        match self {
            DeltaStatus::Added => filter.contains(DiffFilter::ADDED),
            DeltaStatus::Deleted => filter.contains(DiffFilter::DELETED),
            DeltaStatus::Modified => filter.contains(DiffFilter::MODIFIED),
            DeltaStatus::Renamed => filter.contains(DiffFilter::RENAMED),
            DeltaStatus::Typechange => filter.contains(DiffFilter::TYPECHANGE),
            DeltaStatus::Unmodified => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delta {
    pub status: DeltaStatus,
    pub old_path: PathBuf,
    pub new_path: PathBuf,
    pub old: Option<DatabaseEntry>,
    pub new: Option<DatabaseEntry>,
    /// Rename score in percent
    pub similarity: Option<u8>,
    /// Set when either side is binary; such deltas carry no hunks
    pub binary: bool,
    pub hunks: Vec<Hunk>,
}

impl Delta {
    pub fn new(
        status: DeltaStatus,
        path: PathBuf,
        old: Option<DatabaseEntry>,
        new: Option<DatabaseEntry>,
    ) -> Self {
        Delta {
            status,
            old_path: path.clone(),
            new_path: path,
            old,
            new,
            similarity: None,
            binary: false,
            hunks: Vec::new(),
        }
    }

    /// Classify a change between two non-tree entries of one path
    pub fn from_entries(
        path: PathBuf,
        old: Option<DatabaseEntry>,
        new: Option<DatabaseEntry>,
    ) -> Option<Self> {
        let status = match (old, new) {
            (None, None) => return None,
            (None, Some(_)) => DeltaStatus::Added,
            (Some(_), None) => DeltaStatus::Deleted,
            (Some(old), Some(new)) if old == new => DeltaStatus::Unmodified,
            (Some(old), Some(new)) if old.mode.class() != new.mode.class() => {
                DeltaStatus::Typechange
            }
            (Some(_), Some(_)) => DeltaStatus::Modified,
        };

        Some(Delta::new(status, path, old, new))
    }

    /// The path the delta is reported under: the new path, unless deleted
    pub fn path(&self) -> &Path {
        match self.status {
            DeltaStatus::Deleted => &self.old_path,
            _ => &self.new_path,
        }
    }

    pub fn old_id(&self) -> Option<ObjectId> {
        self.old.map(|entry| entry.oid)
    }

    pub fn new_id(&self) -> Option<ObjectId> {
        self.new.map(|entry| entry.oid)
    }

    pub fn additions(&self) -> usize {
        self.hunks.iter().map(Hunk::additions).sum()
    }

    pub fn deletions(&self) -> usize {
        self.hunks.iter().map(Hunk::deletions).sum()
    }
}

/// Result of one diff call: deltas in path order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diff {
    deltas: Vec<Delta>,
}

impl Diff {
    pub fn new(deltas: Vec<Delta>) -> Self {
        Diff { deltas }
    }

    pub fn deltas(&self) -> &[Delta] {
        &self.deltas
    }

    pub fn into_deltas(self) -> Vec<Delta> {
        self.deltas
    }

    pub fn len(&self) -> usize {
        self.deltas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Delta> {
        self.deltas.iter()
    }

    pub fn delta(&self, path: &Path) -> Option<&Delta> {
        self.deltas.iter().find(|delta| delta.path() == path)
    }

    pub fn stat(&self) -> DiffStat {
        DiffStat::from_diff(self)
    }

    pub fn patch(&self) -> Patch<'_> {
        Patch::new(self)
    }
}

impl<'d> IntoIterator for &'d Diff {
    type Item = &'d Delta;
    type IntoIter = std::slice::Iter<'d, Delta>;

    fn into_iter(self) -> Self::IntoIter {
        self.deltas.iter()
    }
}
