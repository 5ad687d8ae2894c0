//! `merge`: bring another line of history into the current branch
//!
//! Nothing observable changes until every object the merge needs has been
//! looked up and every new object computed. Merged blobs, trees and the
//! merge commit are staged in an [`OverlayStore`], and the content of every
//! workspace file to be written is read into memory. Only then are the
//! objects persisted and the workspace, index and HEAD updated, in that
//! order.

use crate::areas::index::Index;
use crate::areas::repository::Repository;
use crate::areas::store::{ObjectStore, OverlayStore};
use crate::areas::working_set::WorkingSet;
use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::diff::delta::Diff;
use crate::artifacts::diff::options::DiffOptions;
use crate::artifacts::diff::tree_diff::TreeDiff;
use crate::artifacts::graph::walker::GraphWalker;
use crate::artifacts::index::index_entry::IndexEntry;
use crate::artifacts::merge::merge_result::{ConflictEntry, MergeResult};
use crate::artifacts::merge::options::MergeOptions;
use crate::artifacts::merge::resolve::{PathUpdate, TreeMerge, TreeMerger};
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::file_mode::FileMode;
use crate::artifacts::objects::object::Object;
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::{Error, Result};
use bytes::Bytes;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const OURS_LABEL: &str = "HEAD";

/// Workspace content per path, loaded before anything is written; `None`
/// removes the path
type WorkspaceWrites = BTreeMap<PathBuf, Option<(Bytes, FileMode)>>;

impl Repository {
    /// Merge the commit named by `revision` into HEAD
    pub fn merge(&self, revision: &str, options: &MergeOptions) -> Result<MergeResult> {
        let mut index = self.index();
        index.rehydrate()?;
        if index.has_conflicts() || self.merge_head()?.is_some() {
            return Err(Error::invalid_argument(
                "a previous merge is unresolved; resolve and commit it first",
            ));
        }

        let theirs = self.resolve_commit(revision)?;
        let Some(ours) = self.head_commit()? else {
            tracing::info!(%theirs, "merging into an unborn branch");
            return self.fast_forward(&mut index, None, theirs, options);
        };
        tracing::info!(%ours, %theirs, "merging");

        let base = GraphWalker::new(self.store())
            .merge_base(&ours, &theirs)?
            .ok_or(Error::NoMergeBase { ours, theirs })?;

        if base == theirs {
            tracing::info!("already up to date");
            return Ok(MergeResult::up_to_date());
        }
        if base == ours && options.allow_fast_forward {
            return self.fast_forward(&mut index, Some(ours), theirs, options);
        }

        self.three_way(&mut index, base, ours, theirs, revision, options)
    }

    fn fast_forward(
        &self,
        index: &mut Index,
        ours: Option<ObjectId>,
        theirs: ObjectId,
        options: &MergeOptions,
    ) -> Result<MergeResult> {
        let ours_tree = match ours {
            Some(ours) => Some(self.database().lookup_commit(&ours)?.tree_oid()),
            None => None,
        };
        let theirs_tree = self.database().lookup_commit(&theirs)?.tree_oid();

        let changes = self.tree_changes(ours_tree, theirs_tree)?;
        let updates = changes
            .iter()
            .map(|delta| {
                let update = match delta.new {
                    Some(entry) => PathUpdate::Entry(entry),
                    None => PathUpdate::Remove,
                };
                (delta.path().to_path_buf(), update)
            })
            .collect::<BTreeMap<_, _>>();

        let blocked =
            self.blocked_paths(index, ours_tree, updates.keys().map(PathBuf::as_path))?;
        if !blocked.is_empty() {
            let conflicts = self.local_change_conflicts(blocked, ours_tree, |path| {
                changes.delta(path).and_then(|delta| delta.new)
            })?;
            return Ok(MergeResult::conflicted(ours, conflicts));
        }

        let entries = self.database().flatten_tree(&theirs_tree)?;
        let writes = match options.update_workspace {
            true => self.load_updates(&updates, self.store())?,
            false => WorkspaceWrites::new(),
        };

        self.apply_updates(&writes)?;
        self.stage(index, &entries, &[], options.update_workspace)?;
        index.write_updates()?;
        self.refs().update_head(theirs)?;

        tracing::info!(%theirs, "fast-forwarded");
        Ok(MergeResult::fast_forward())
    }

    fn three_way(
        &self,
        index: &mut Index,
        base: ObjectId,
        ours: ObjectId,
        theirs: ObjectId,
        revision: &str,
        options: &MergeOptions,
    ) -> Result<MergeResult> {
        let base_tree = self.database().lookup_commit(&base)?.tree_oid();
        let ours_tree = self.database().lookup_commit(&ours)?.tree_oid();
        let theirs_tree = self.database().lookup_commit(&theirs)?.tree_oid();

        let overlay = OverlayStore::new(self.store());
        let merge = TreeMerger::new(&overlay, OURS_LABEL, revision).merge(
            Some(base_tree),
            ours_tree,
            theirs_tree,
        )?;

        let blocked = self.blocked_paths(index, Some(ours_tree), merge.touched_paths())?;
        if !blocked.is_empty() {
            let conflicts = self.local_change_conflicts(blocked, Some(ours_tree), |path| {
                merge.entries.get(path).copied()
            })?;
            return Ok(MergeResult::conflicted(Some(base), conflicts));
        }

        let writes = match options.update_workspace {
            true => self.load_updates(&merge.updates, &overlay)?,
            false => WorkspaceWrites::new(),
        };

        if !merge.is_clean() {
            tracing::info!(conflicts = merge.conflicts.len(), "merge stopped on conflicts");
            self.materialize(index, &merge, &writes, overlay, options)?;
            self.write_merge_head(theirs)?;

            return Ok(MergeResult::conflicted(Some(base), merge.conflicts));
        }

        let tree = merge.write_tree(&overlay)?;
        let commit = match options.commit_on_success {
            true => {
                let commit = Commit::new(
                    vec![ours, theirs],
                    tree,
                    options.merger.clone(),
                    options.message_for(revision),
                );
                Some(overlay.write(&Object::Commit(commit))?)
            }
            false => None,
        };

        self.materialize(index, &merge, &writes, overlay, options)?;
        match commit {
            Some(commit) => {
                self.refs().update_head(commit)?;
                tracing::info!(%commit, "merge committed");
            }
            None => self.write_merge_head(theirs)?,
        }

        Ok(MergeResult::merged(base, commit))
    }

    /// Persist new objects, then rewrite the workspace and index
    fn materialize(
        &self,
        index: &mut Index,
        merge: &TreeMerge,
        writes: &WorkspaceWrites,
        overlay: OverlayStore<'_>,
        options: &MergeOptions,
    ) -> Result<()> {
        let written = overlay.persist()?;
        tracing::debug!(objects = written, "persisted merge objects");

        self.apply_updates(writes)?;
        self.stage(index, &merge.entries, &merge.conflicts, options.update_workspace)?;
        index.write_updates()
    }

    /// Record `theirs` as the second parent of the next commit
    fn write_merge_head(&self, theirs: ObjectId) -> Result<()> {
        let path = self.merge_head_path();
        std::fs::write(&path, format!("{theirs}\n")).map_err(|e| Error::io(&path, e))
    }

    /// Diff of two trees without hunks
    fn tree_changes(&self, old: Option<ObjectId>, new: ObjectId) -> Result<Diff> {
        let options = DiffOptions {
            skip_hunks: true,
            ..Default::default()
        };

        TreeDiff::new(self.store(), &options).diff(old, Some(new))
    }

    /// Paths the merge would rewrite that carry uncommitted changes, either
    /// staged, in tracked workspace files, or as untracked files in the way
    fn blocked_paths<'p>(
        &self,
        index: &Index,
        head_tree: Option<ObjectId>,
        touched: impl IntoIterator<Item = &'p Path>,
    ) -> Result<BTreeMap<PathBuf, Option<DatabaseEntry>>> {
        let local = self.local_changes(index, head_tree)?;
        let mut blocked = BTreeMap::new();

        for path in touched {
            if let Some(entry) = local.get(path) {
                blocked.insert(path.to_path_buf(), *entry);
            } else if !index.is_tracked(path) && self.workspace().exists(path) {
                let (_, mode) = self.workspace().stat_file(path)?;
                if !mode.is_tree() {
                    blocked.insert(path.to_path_buf(), None);
                }
            }
        }

        if !blocked.is_empty() {
            tracing::info!(paths = blocked.len(), "local changes would be overwritten");
        }
        Ok(blocked)
    }

    /// Uncommitted state per changed path: the workspace entry when the file
    /// differs from the index, else the staged entry
    fn local_changes(
        &self,
        index: &Index,
        head_tree: Option<ObjectId>,
    ) -> Result<BTreeMap<PathBuf, Option<DatabaseEntry>>> {
        let algorithm = self.hash_algorithm();
        let staged = WorkingSet::from_index(index, algorithm)?;
        let worktree = WorkingSet::from_workspace(self.workspace(), index, algorithm, false)?;

        let store = OverlayStore::with_objects(
            self.store(),
            staged.objects().iter().chain(worktree.objects()).cloned(),
        );
        let options = DiffOptions {
            skip_hunks: true,
            ..Default::default()
        };

        let mut changes = BTreeMap::new();
        for (old, new) in [
            (head_tree, staged.root()),
            (Some(staged.root()), worktree.root()),
        ] {
            for delta in TreeDiff::new(&store, &options).diff(old, Some(new))?.iter() {
                changes.insert(delta.path().to_path_buf(), delta.new);
            }
        }

        Ok(changes)
    }

    fn local_change_conflicts(
        &self,
        blocked: BTreeMap<PathBuf, Option<DatabaseEntry>>,
        head_tree: Option<ObjectId>,
        incoming: impl Fn(&Path) -> Option<DatabaseEntry>,
    ) -> Result<Vec<ConflictEntry>> {
        let head = match head_tree {
            Some(tree) => self.database().flatten_tree(&tree)?,
            None => BTreeMap::new(),
        };

        Ok(blocked
            .into_iter()
            .map(|(path, local)| {
                let ancestor = head.get(&path).copied();
                let theirs = incoming(&path);
                ConflictEntry::new(path, ancestor, local, theirs)
            })
            .collect())
    }

    /// Read every blob the workspace update needs; submodules are skipped
    fn load_updates(
        &self,
        updates: &BTreeMap<PathBuf, PathUpdate>,
        store: &dyn ObjectStore,
    ) -> Result<WorkspaceWrites> {
        let mut writes = WorkspaceWrites::new();

        for (path, update) in updates {
            let write = match update {
                PathUpdate::Entry(entry) if entry.mode == FileMode::Submodule => continue,
                PathUpdate::Entry(entry) => {
                    Some((store.lookup_blob(&entry.oid)?.into_content(), entry.mode))
                }
                PathUpdate::Marked { content, mode } => Some((content.clone(), *mode)),
                PathUpdate::Remove => None,
            };
            writes.insert(path.clone(), write);
        }

        Ok(writes)
    }

    /// Write or remove workspace files; removals go first so files and
    /// directories can swap places
    fn apply_updates(&self, writes: &WorkspaceWrites) -> Result<()> {
        for (path, write) in writes {
            if write.is_none() && self.workspace().exists(path) {
                self.workspace().remove_file(path)?;
            }
        }

        for (path, write) in writes {
            if let Some((content, mode)) = write {
                self.workspace().write_file(path, content, *mode)?;
            }
        }

        Ok(())
    }

    /// Replace the index with the merged entries plus conflict stages,
    /// reusing cached stat data where an entry is unchanged
    fn stage(
        &self,
        index: &mut Index,
        entries: &BTreeMap<PathBuf, DatabaseEntry>,
        conflicts: &[ConflictEntry],
        workspace_updated: bool,
    ) -> Result<()> {
        let mut staged = Vec::with_capacity(entries.len());

        for (path, entry) in entries {
            let cached = index
                .entry_by_path(path)
                .filter(|cached| cached.as_database_entry() == *entry);

            let staged_entry = match cached {
                Some(cached) => cached.clone(),
                None if workspace_updated && self.workspace().exists(path) => {
                    let (metadata, _) = self.workspace().stat_file(path)?;
                    IndexEntry::new(path.clone(), entry.oid, entry.mode).with_metadata(metadata)
                }
                None => IndexEntry::new(path.clone(), entry.oid, entry.mode),
            };
            staged.push(staged_entry);
        }

        index.replace_entries(staged);
        for conflict in conflicts {
            index.add_conflict(conflict);
        }

        tracing::debug!(
            entries = entries.len(),
            conflicts = conflicts.len(),
            "staged merge result"
        );
        Ok(())
    }
}
