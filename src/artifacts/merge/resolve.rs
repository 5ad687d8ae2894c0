//! Path-by-path reconciliation of two trees against their merge base
//!
//! Both sides are diffed against the base. Paths touched by one side take
//! that side's entry, paths both sides changed identically are convergent,
//! and everything else is either merged line by line or recorded as a
//! [`ConflictEntry`]. Merged blobs are written into the given store, which
//! the caller keeps as an overlay until the merge is committed.

use crate::areas::store::ObjectStore;
use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::diff::delta::{Delta, Diff};
use crate::artifacts::diff::options::DiffOptions;
use crate::artifacts::diff::tree_diff::TreeDiff;
use crate::artifacts::merge::merge_result::ConflictEntry;
use crate::artifacts::merge::three_way::ThreeWayMerge;
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::file_mode::{FileMode, ModeClass};
use crate::artifacts::objects::object::Object;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::tree::{TreeBuilder, path_components};
use crate::errors::Result;
use bytes::Bytes;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// What the workspace should hold at a path after the merge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathUpdate {
    Entry(DatabaseEntry),
    /// Conflicted text carrying markers; not staged
    Marked { content: Bytes, mode: FileMode },
    Remove,
}

/// Result of reconciling two trees
#[derive(Debug, Clone, Default)]
pub struct TreeMerge {
    /// Merged stage 0 entries; conflicted paths are left out
    pub entries: BTreeMap<PathBuf, DatabaseEntry>,
    pub conflicts: Vec<ConflictEntry>,
    /// Paths where the result differs from `ours`
    pub updates: BTreeMap<PathBuf, PathUpdate>,
}

impl TreeMerge {
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// Every path the merge would rewrite in the index or workspace
    pub fn touched_paths(&self) -> BTreeSet<&Path> {
        self.updates
            .keys()
            .chain(self.conflicts.iter().map(|conflict| &conflict.path))
            .map(PathBuf::as_path)
            .collect()
    }

    /// Write the merged tree objects into `store`, returning the root id
    pub fn write_tree(&self, store: &dyn ObjectStore) -> Result<ObjectId> {
        let mut builder = TreeBuilder::new();
        for (path, entry) in &self.entries {
            builder.insert(path, *entry)?;
        }

        let built = builder.build(store.hash_algorithm())?;
        for (_, tree) in built.trees {
            store.write(&Object::Tree(tree))?;
        }

        Ok(built.root)
    }
}

enum Resolution {
    Resolved(DatabaseEntry),
    Conflict(Option<PathUpdate>),
}

pub struct TreeMerger<'s> {
    store: &'s dyn ObjectStore,
    ours_label: String,
    theirs_label: String,
}

impl<'s> TreeMerger<'s> {
    pub fn new(
        store: &'s dyn ObjectStore,
        ours_label: impl Into<String>,
        theirs_label: impl Into<String>,
    ) -> Self {
        TreeMerger {
            store,
            ours_label: ours_label.into(),
            theirs_label: theirs_label.into(),
        }
    }

    /// Reconcile `ours` and `theirs` against `base` (`None` for disjoint
    /// histories, diffed as the empty tree)
    pub fn merge(
        &self,
        base: Option<ObjectId>,
        ours: ObjectId,
        theirs: ObjectId,
    ) -> Result<TreeMerge> {
        let options = DiffOptions {
            skip_hunks: true,
            ..Default::default()
        };
        let ours_diff = TreeDiff::new(self.store, &options).diff(base, Some(ours))?;
        let theirs_diff = TreeDiff::new(self.store, &options).diff(base, Some(theirs))?;
        tracing::debug!(
            ours = ours_diff.len(),
            theirs = theirs_diff.len(),
            "reconciling changes"
        );

        let ours_changes = by_path(&ours_diff);
        let mut merge = TreeMerge {
            entries: self.store.flatten_tree(&ours)?,
            ..Default::default()
        };

        for (path, theirs_delta) in by_path(&theirs_diff) {
            let ancestor = theirs_delta.old;
            let theirs_entry = theirs_delta.new;

            let Some(ours_delta) = ours_changes.get(&path) else {
                match theirs_entry {
                    Some(entry) => {
                        merge.entries.insert(path.clone(), entry);
                        merge.updates.insert(path, PathUpdate::Entry(entry));
                    }
                    None => {
                        merge.entries.remove(&path);
                        merge.updates.insert(path, PathUpdate::Remove);
                    }
                }
                continue;
            };

            let ours_entry = ours_delta.new;
            if ours_entry == theirs_entry {
                tracing::trace!(path = %path.display(), "convergent change");
                continue;
            }

            match self.reconcile(ancestor, ours_entry, theirs_entry)? {
                Resolution::Resolved(entry) => {
                    merge.entries.insert(path.clone(), entry);
                    merge.updates.insert(path, PathUpdate::Entry(entry));
                }
                Resolution::Conflict(update) => {
                    tracing::debug!(path = %path.display(), "conflict");
                    merge.entries.remove(&path);
                    if let Some(update) = update {
                        merge.updates.insert(path.clone(), update);
                    }
                    merge.conflicts.push(ConflictEntry::new(
                        path,
                        ancestor,
                        ours_entry,
                        theirs_entry,
                    ));
                }
            }
        }

        self.resolve_directory_clashes(&mut merge, base, ours, theirs)?;
        merge.conflicts.sort_by(|a, b| a.path.cmp(&b.path));

        Ok(merge)
    }

    fn reconcile(
        &self,
        ancestor: Option<DatabaseEntry>,
        ours: Option<DatabaseEntry>,
        theirs: Option<DatabaseEntry>,
    ) -> Result<Resolution> {
        let (Some(ours), Some(theirs)) = (ours, theirs) else {
            // deleted on one side, changed on the other: keep the surviving
            // file in the workspace for inspection
            let update = match (ours, theirs) {
                (None, Some(theirs)) => Some(PathUpdate::Entry(theirs)),
                _ => None,
            };
            return Ok(Resolution::Conflict(update));
        };

        if ours.mode.class() != theirs.mode.class() {
            return Ok(Resolution::Conflict(None));
        }

        let mode = merge_modes(ancestor.map(|entry| entry.mode), ours.mode, theirs.mode);
        if ours.oid == theirs.oid {
            return Ok(match mode {
                Some(mode) => Resolution::Resolved(DatabaseEntry::new(ours.oid, mode)),
                None => Resolution::Conflict(None),
            });
        }

        if ours.mode.class() != ModeClass::Regular {
            return Ok(Resolution::Conflict(None));
        }

        let base_content = match ancestor {
            Some(entry) if entry.mode.class() == ModeClass::Regular => {
                self.store.lookup_blob(&entry.oid)?.into_content()
            }
            _ => Bytes::new(),
        };
        let ours_blob = self.store.lookup_blob(&ours.oid)?;
        let theirs_blob = self.store.lookup_blob(&theirs.oid)?;
        if ours_blob.is_binary() || theirs_blob.is_binary() {
            return Ok(Resolution::Conflict(None));
        }

        let merged = ThreeWayMerge::new(&base_content, ours_blob.content(), theirs_blob.content())
            .merge(&self.ours_label, &self.theirs_label);

        match mode {
            Some(mode) if merged.is_clean() => {
                let oid = self.store.write(&Object::Blob(Blob::new(merged.content)))?;
                Ok(Resolution::Resolved(DatabaseEntry::new(oid, mode)))
            }
            _ => Ok(Resolution::Conflict(Some(PathUpdate::Marked {
                content: merged.content,
                mode: mode.unwrap_or(ours.mode),
            }))),
        }
    }

    /// Turn files that now sit where the other side put a directory into
    /// file/directory conflicts
    fn resolve_directory_clashes(
        &self,
        merge: &mut TreeMerge,
        base: Option<ObjectId>,
        ours: ObjectId,
        theirs: ObjectId,
    ) -> Result<()> {
        let clashes = merge
            .entries
            .keys()
            .flat_map(|path| path.ancestors().skip(1))
            .filter(|parent| merge.entries.contains_key(*parent))
            .map(Path::to_path_buf)
            .collect::<BTreeSet<_>>();

        for path in clashes {
            tracing::debug!(path = %path.display(), "file/directory conflict");
            let ancestor = match base {
                Some(base) => self.entry_at(base, &path)?,
                None => None,
            };
            let ours_entry = self.entry_at(ours, &path)?;
            let theirs_entry = self.entry_at(theirs, &path)?;

            merge.entries.remove(&path);
            if ours_entry.is_some_and(|entry| !entry.is_tree()) {
                merge.updates.insert(path.clone(), PathUpdate::Remove);
            } else {
                merge.updates.remove(&path);
            }
            merge
                .conflicts
                .push(ConflictEntry::new(path, ancestor, ours_entry, theirs_entry));
        }

        Ok(())
    }

    /// Entry found at `path` below the tree `root`, directories included
    fn entry_at(&self, root: ObjectId, path: &Path) -> Result<Option<DatabaseEntry>> {
        let mut current = DatabaseEntry::new(root, FileMode::Tree);

        for name in path_components(path)? {
            if !current.is_tree() {
                return Ok(None);
            }
            match self.store.lookup_tree(&current.oid)?.entry(name) {
                Some(entry) => current = entry.as_database_entry(),
                None => return Ok(None),
            }
        }

        Ok(Some(current))
    }
}

fn by_path(diff: &Diff) -> BTreeMap<PathBuf, &Delta> {
    diff.iter()
        .map(|delta| (delta.path().to_path_buf(), delta))
        .collect()
}

/// Mode after both sides' changes, or `None` when they changed it differently
fn merge_modes(ancestor: Option<FileMode>, ours: FileMode, theirs: FileMode) -> Option<FileMode> {
    if ours == theirs || ancestor == Some(theirs) {
        Some(ours)
    } else if ancestor == Some(ours) {
        Some(theirs)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::areas::store::MemoryStore;
    use crate::artifacts::objects::object_id::HashAlgorithm;
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    struct Trees {
        store: MemoryStore,
    }

    impl Trees {
        fn blob(&self, content: &str) -> DatabaseEntry {
            let oid = self.store.write(&Object::Blob(Blob::from(content))).unwrap();
            DatabaseEntry::new(oid, FileMode::Blob)
        }

        fn tree(&self, files: &[(&str, &str)]) -> ObjectId {
            self.tree_with_modes(
                &files
                    .iter()
                    .map(|(path, content)| (*path, *content, FileMode::Blob))
                    .collect::<Vec<_>>(),
            )
        }

        fn tree_with_modes(&self, files: &[(&str, &str, FileMode)]) -> ObjectId {
            let merge = TreeMerge {
                entries: files
                    .iter()
                    .map(|(path, content, mode)| {
                        let blob = self.blob(content);
                        (PathBuf::from(path), DatabaseEntry::new(blob.oid, *mode))
                    })
                    .collect(),
                ..Default::default()
            };
            merge.write_tree(&self.store).unwrap()
        }

        fn merge(&self, base: ObjectId, ours: ObjectId, theirs: ObjectId) -> TreeMerge {
            TreeMerger::new(&self.store, "ours", "theirs")
                .merge(Some(base), ours, theirs)
                .unwrap()
        }

        fn content(&self, entry: &DatabaseEntry) -> String {
            let blob = self.store.lookup_blob(&entry.oid).unwrap();
            String::from_utf8(blob.content().to_vec()).unwrap()
        }
    }

    #[fixture]
    fn trees() -> Trees {
        Trees {
            store: MemoryStore::new(HashAlgorithm::Sha1),
        }
    }

    #[rstest]
    fn one_sided_changes_are_taken(trees: Trees) {
        let base = trees.tree(&[("a.txt", "a\n"), ("b.txt", "b\n")]);
        let ours = trees.tree(&[("a.txt", "A\n"), ("b.txt", "b\n")]);
        let theirs = trees.tree(&[("a.txt", "a\n"), ("c.txt", "c\n")]);

        let merge = trees.merge(base, ours, theirs);

        assert!(merge.is_clean());
        let paths = merge.entries.keys().cloned().collect::<Vec<_>>();
        assert_eq!(paths, vec![PathBuf::from("a.txt"), PathBuf::from("c.txt")]);
        assert_eq!(trees.content(&merge.entries[Path::new("a.txt")]), "A\n");
        assert_eq!(
            merge.updates.get(Path::new("b.txt")),
            Some(&PathUpdate::Remove)
        );
        assert!(!merge.updates.contains_key(Path::new("a.txt")));
    }

    #[rstest]
    fn non_overlapping_line_changes_merge(trees: Trees) {
        let base = trees.tree(&[("a.txt", "1\n2\n3\n")]);
        let ours = trees.tree(&[("a.txt", "1\nX\n3\n")]);
        let theirs = trees.tree(&[("a.txt", "1\n2\nY\n")]);

        let merge = trees.merge(base, ours, theirs);

        assert!(merge.is_clean());
        assert_eq!(trees.content(&merge.entries[Path::new("a.txt")]), "1\nX\nY\n");
    }

    #[rstest]
    fn same_line_changes_conflict(trees: Trees) {
        let base = trees.tree(&[("a.txt", "1\n2\n3\n")]);
        let ours = trees.tree(&[("a.txt", "1\nX\n3\n")]);
        let theirs = trees.tree(&[("a.txt", "1\nY\n3\n")]);

        let merge = trees.merge(base, ours, theirs);

        assert_eq!(merge.conflicts.len(), 1);
        let conflict = &merge.conflicts[0];
        assert_eq!(conflict.path, PathBuf::from("a.txt"));
        assert_eq!(conflict.kind(), "content");
        assert!(!merge.entries.contains_key(Path::new("a.txt")));
        assert!(matches!(
            merge.updates.get(Path::new("a.txt")),
            Some(PathUpdate::Marked { content, .. }) if content.starts_with(b"1\n<<<<<<< ours\n")
        ));
    }

    #[rstest]
    fn identical_changes_are_convergent(trees: Trees) {
        let base = trees.tree(&[("a.txt", "a\n")]);
        let both = trees.tree(&[("a.txt", "same\n"), ("new.txt", "n\n")]);

        let merge = trees.merge(base, both, both);

        assert!(merge.is_clean());
        assert!(merge.updates.is_empty());
        assert_eq!(merge.write_tree(&trees.store).unwrap(), both);
    }

    #[rstest]
    fn delete_and_modify_conflict(trees: Trees) {
        let base = trees.tree(&[("a.txt", "a\n"), ("keep", "k\n")]);
        let ours = trees.tree(&[("keep", "k\n")]);
        let theirs = trees.tree(&[("a.txt", "changed\n"), ("keep", "k\n")]);

        let merge = trees.merge(base, ours, theirs);

        assert_eq!(merge.conflicts.len(), 1);
        assert_eq!(merge.conflicts[0].kind(), "delete/modify");
        assert!(matches!(
            merge.updates.get(Path::new("a.txt")),
            Some(PathUpdate::Entry(_))
        ));
    }

    #[rstest]
    fn different_additions_conflict(trees: Trees) {
        let base = trees.tree(&[("keep", "k\n")]);
        let ours = trees.tree(&[("keep", "k\n"), ("new", "ours\n")]);
        let theirs = trees.tree(&[("keep", "k\n"), ("new", "theirs\n")]);

        let merge = trees.merge(base, ours, theirs);

        assert_eq!(merge.conflicts.len(), 1);
        assert_eq!(merge.conflicts[0].kind(), "add/add");
    }

    #[rstest]
    fn mode_changes_merge_with_content_changes(trees: Trees) {
        let base = trees.tree(&[("run.sh", "echo 1\n")]);
        let ours = trees.tree_with_modes(&[("run.sh", "echo 1\n", FileMode::Executable)]);
        let theirs = trees.tree(&[("run.sh", "echo 2\n")]);

        let merge = trees.merge(base, ours, theirs);

        assert!(merge.is_clean());
        let entry = merge.entries[Path::new("run.sh")];
        assert_eq!(entry.mode, FileMode::Executable);
        assert_eq!(trees.content(&entry), "echo 2\n");
    }

    #[rstest]
    fn divergent_mode_changes_conflict(trees: Trees) {
        let base = trees.tree(&[("link", "target")]);
        let ours = trees.tree_with_modes(&[("link", "target", FileMode::Executable)]);
        let theirs = trees.tree_with_modes(&[("link", "target", FileMode::Symlink)]);

        let merge = trees.merge(base, ours, theirs);

        assert_eq!(merge.conflicts.len(), 1);
    }

    #[rstest]
    fn files_and_directories_clash(trees: Trees) {
        let base = trees.tree(&[("keep", "k\n")]);
        let ours = trees.tree(&[("keep", "k\n"), ("thing", "file\n")]);
        let theirs = trees.tree(&[("keep", "k\n"), ("thing/inner", "nested\n")]);

        let merge = trees.merge(base, ours, theirs);

        assert_eq!(merge.conflicts.len(), 1);
        assert_eq!(merge.conflicts[0].path, PathBuf::from("thing"));
        assert_eq!(merge.conflicts[0].kind(), "file/directory");
        assert!(merge.entries.contains_key(Path::new("thing/inner")));
        assert_eq!(merge.updates.get(Path::new("thing")), Some(&PathUpdate::Remove));
    }

    #[rstest]
    fn missing_objects_abort(trees: Trees) {
        let base = trees.tree(&[("a", "a\n")]);
        let missing = HashAlgorithm::Sha1.digest(b"missing");

        let result = TreeMerger::new(&trees.store, "ours", "theirs").merge(Some(base), base, missing);

        assert!(result.is_err_and(|err| err.is_lookup_error()));
    }
}
