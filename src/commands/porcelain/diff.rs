use crate::areas::repository::Repository;
use crate::areas::store::OverlayStore;
use crate::areas::working_set::WorkingSet;
use crate::artifacts::diff::delta::Diff;
use crate::artifacts::diff::options::{DiffOptions, DiffOutput};
use crate::artifacts::diff::patch::Patch;
use crate::artifacts::diff::tree_diff::TreeDiff;
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::{Error, Result};
use std::io::Write;
use std::path::{Path, PathBuf};

/// What a diff produced, according to the requested [`DiffOutput`]
#[derive(Debug, Clone)]
pub enum DiffResult {
    Structured(Diff),
    Text(String),
    /// Patch written to this file
    Written(PathBuf),
}

/// One side of a diff before it is turned into a tree
enum Side {
    Tree(Option<ObjectId>),
    Index,
    Workspace,
}

impl Repository {
    /// Diff two snapshots chosen the way `git diff` does:
    ///
    /// | `old`  | `new`  | `cached` | compares           |
    /// |--------|--------|----------|--------------------|
    /// | `None` | `None` | false    | index vs workspace |
    /// | `None` | `None` | true     | HEAD vs index      |
    /// | `Some` | `None` | false    | tree vs workspace  |
    /// | `Some` | `None` | true     | tree vs index      |
    /// | `Some` | `Some` | ignored  | tree vs tree       |
    ///
    /// `old` and `new` are revisions naming trees, commits or tags.
    pub fn diff(
        &self,
        old: Option<&str>,
        new: Option<&str>,
        cached: bool,
        options: &DiffOptions,
        output: &DiffOutput,
    ) -> Result<DiffResult> {
        let diff = self.diff_snapshots(old, new, cached, options)?;

        match output {
            DiffOutput::Structured => Ok(DiffResult::Structured(diff)),
            DiffOutput::Text => Ok(DiffResult::Text(Patch::new(&diff).to_string())),
            DiffOutput::File(path) => {
                let path = self.path().join(path);
                write_atomically(&path, Patch::new(&diff).to_string().as_bytes())?;
                Ok(DiffResult::Written(path))
            }
        }
    }

    fn diff_snapshots(
        &self,
        old: Option<&str>,
        new: Option<&str>,
        cached: bool,
        options: &DiffOptions,
    ) -> Result<Diff> {
        let (old, new) = match (old, new, cached) {
            (None, Some(_), _) => {
                return Err(Error::invalid_argument(
                    "a second tree requires a first tree to compare against",
                ));
            }
            (None, None, false) => (Side::Index, Side::Workspace),
            (None, None, true) => (Side::Tree(self.head_tree()?), Side::Index),
            (Some(old), None, false) => (Side::Tree(Some(self.resolve_tree(old)?)), Side::Workspace),
            (Some(old), None, true) => (Side::Tree(Some(self.resolve_tree(old)?)), Side::Index),
            (Some(old), Some(new), _) => (
                Side::Tree(Some(self.resolve_tree(old)?)),
                Side::Tree(Some(self.resolve_tree(new)?)),
            ),
        };

        let needs_index = matches!(old, Side::Index) || matches!(new, Side::Index | Side::Workspace);
        let mut index = self.index();
        if needs_index {
            index.rehydrate()?;
        }

        let mut snapshots = Vec::new();
        let mut root_of = |side: Side| -> Result<Option<ObjectId>> {
            let set = match side {
                Side::Tree(oid) => return Ok(oid),
                Side::Index => WorkingSet::from_index(&index, self.hash_algorithm())?,
                Side::Workspace => WorkingSet::from_workspace(
                    self.workspace(),
                    &index,
                    self.hash_algorithm(),
                    options.include_untracked,
                )?,
            };
            let root = set.root();
            snapshots.push(set);
            Ok(Some(root))
        };
        let old_root = root_of(old)?;
        let new_root = root_of(new)?;

        let store = OverlayStore::with_objects(
            self.store(),
            snapshots.iter().flat_map(|set| set.objects().iter().cloned()),
        );
        tracing::debug!(pending = store.pending_len(), "diffing snapshots");

        TreeDiff::new(&store, options).diff(old_root, new_root)
    }
}

/// Replace `path` with `data` through a temporary sibling file, so a failed
/// write leaves no partial output behind
fn write_atomically(path: &Path, data: &[u8]) -> Result<()> {
    let output_error = |source: std::io::Error| Error::OutputIo {
        path: path.to_path_buf(),
        source,
    };

    let file_name = path
        .file_name()
        .ok_or_else(|| Error::invalid_argument(format!("{} is not a file", path.display())))?;
    let temp_path = path.with_file_name(format!(
        ".{}.tmp-{}",
        file_name.to_string_lossy(),
        std::process::id()
    ));

    let written = std::fs::File::create(&temp_path)
        .and_then(|mut file| file.write_all(data).and_then(|_| file.sync_all()))
        .and_then(|_| std::fs::rename(&temp_path, path));

    written.map_err(|e| {
        let _ = std::fs::remove_file(&temp_path);
        output_error(e)
    })
}
