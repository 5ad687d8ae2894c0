use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::objects::object_id::ObjectId;
use derive_new::new;
use std::fmt;
use std::path::PathBuf;

/// The three candidate entries of a conflicted path
///
/// An absent side means the path does not exist there: no ancestor marks an
/// add/add conflict, a missing `ours` or `theirs` a delete/modify conflict.
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct ConflictEntry {
    pub path: PathBuf,
    pub ancestor: Option<DatabaseEntry>,
    pub ours: Option<DatabaseEntry>,
    pub theirs: Option<DatabaseEntry>,
}

impl ConflictEntry {
    /// Short description used in command output
    pub fn kind(&self) -> &'static str {
        match (&self.ancestor, &self.ours, &self.theirs) {
            (_, Some(ours), Some(theirs)) if ours.is_tree() != theirs.is_tree() => {
                "file/directory"
            }
            (None, Some(_), Some(_)) => "add/add",
            (_, None, Some(_)) => "delete/modify",
            (_, Some(_), None) => "modify/delete",
            _ => "content",
        }
    }
}

impl fmt::Display for ConflictEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CONFLICT ({}): {}", self.kind(), self.path.display())
    }
}

/// Outcome of one merge invocation
///
/// Exactly one of `up_to_date`, `fast_forward` or a normal merge (with or
/// without conflicts) holds. `commit` is set only when a merge commit was
/// created, which never happens with conflicts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeResult {
    pub up_to_date: bool,
    pub fast_forward: bool,
    pub has_conflicts: bool,
    pub commit: Option<ObjectId>,
    pub conflicts: Vec<ConflictEntry>,
    /// Merge base used for a normal merge
    pub base: Option<ObjectId>,
}

impl MergeResult {
    pub fn up_to_date() -> Self {
        MergeResult {
            up_to_date: true,
            ..Default::default()
        }
    }

    pub fn fast_forward() -> Self {
        MergeResult {
            fast_forward: true,
            ..Default::default()
        }
    }

    pub fn conflicted(base: Option<ObjectId>, conflicts: Vec<ConflictEntry>) -> Self {
        MergeResult {
            has_conflicts: true,
            conflicts,
            base,
            ..Default::default()
        }
    }

    pub fn merged(base: ObjectId, commit: Option<ObjectId>) -> Self {
        MergeResult {
            base: Some(base),
            commit,
            ..Default::default()
        }
    }
}

impl fmt::Display for MergeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.up_to_date {
            write!(f, "Already up-to-date")
        } else if self.has_conflicts {
            write!(f, "Merge: Conflicts")
        } else if self.fast_forward {
            write!(f, "Merge: Fast-forward")
        } else {
            write!(f, "Merge")
        }
    }
}
