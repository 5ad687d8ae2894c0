//! Structural comparison of two trees
//!
//! Both trees keep their entries sorted by name, so each level is compared
//! with a single two-pointer pass. Subtrees with equal ids are skipped
//! without being loaded, which keeps unchanged directories O(1).
//!
//! Only content-bearing entries (blobs, executables, symlinks) are ever
//! loaded from the store; submodule ids point into another repository and
//! are compared by id alone.

use crate::areas::store::ObjectStore;
use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::diff::delta::{Delta, DeltaStatus, Diff};
use crate::artifacts::diff::hunk::diff_lines;
use crate::artifacts::diff::options::DiffOptions;
use crate::artifacts::diff::rename::RenameDetector;
use crate::artifacts::objects::blob::is_binary;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::tree::{Tree, TreeEntry, join_path};
use crate::errors::Result;
use bytes::Bytes;
use std::cmp::Ordering;
use std::path::Path;

pub struct TreeDiff<'r> {
    store: &'r dyn ObjectStore,
    options: &'r DiffOptions,
    deltas: Vec<Delta>,
}

impl<'r> TreeDiff<'r> {
    pub fn new(store: &'r dyn ObjectStore, options: &'r DiffOptions) -> Self {
        TreeDiff {
            store,
            options,
            deltas: Vec::new(),
        }
    }

    /// Diff two trees (`None` is the empty tree) into a finished [`Diff`]
    ///
    /// Renames are paired, the status filter applied, and hunks generated
    /// for text files unless the options skip them.
    pub fn diff(mut self, old: Option<ObjectId>, new: Option<ObjectId>) -> Result<Diff> {
        tracing::debug!(
            old = ?old.map(|oid| oid.to_short_oid()),
            new = ?new.map(|oid| oid.to_short_oid()),
            "diffing trees"
        );

        self.compare_oids(old.as_ref(), new.as_ref(), Path::new(""))?;

        let store = self.store;
        let options = self.options;
        let mut deltas = self.deltas;

        if let Some(detection) = &options.renames {
            deltas = RenameDetector::new(store, detection).detect(deltas)?;
        }

        deltas.retain(|delta| delta.status.matches_filter(options.filter));

        if !options.skip_hunks {
            for delta in deltas.iter_mut() {
                attach_hunks(store, delta, options.context_lines)?;
            }
        }

        Ok(Diff::new(deltas))
    }

    /// Compare two trees below `prefix`, recording deltas for every
    /// non-tree path that differs
    pub fn compare_oids(
        &mut self,
        old: Option<&ObjectId>,
        new: Option<&ObjectId>,
        prefix: &Path,
    ) -> Result<()> {
        if old == new && !self.options.include_unmodified {
            return Ok(());
        }

        let old_tree = self.load_tree(old)?;
        let new_tree = self.load_tree(new)?;
        tracing::trace!(prefix = %prefix.display(), "comparing tree level");

        self.compare_trees(&old_tree, &new_tree, prefix)
    }

    fn load_tree(&self, oid: Option<&ObjectId>) -> Result<Tree> {
        match oid {
            Some(oid) => self.store.lookup_tree(oid),
            None => Ok(Tree::default()),
        }
    }

    fn compare_trees(&mut self, old: &Tree, new: &Tree, prefix: &Path) -> Result<()> {
        let mut old_entries = old.entries().iter().peekable();
        let mut new_entries = new.entries().iter().peekable();

        loop {
            let order = match (old_entries.peek(), new_entries.peek()) {
                (None, None) => break,
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some(old), Some(new)) => old.name.as_bytes().cmp(new.name.as_bytes()),
            };

            match order {
                Ordering::Less => {
                    if let Some(old) = old_entries.next() {
                        self.compare_entries(Some(old), None, prefix)?;
                    }
                }
                Ordering::Greater => {
                    if let Some(new) = new_entries.next() {
                        self.compare_entries(None, Some(new), prefix)?;
                    }
                }
                Ordering::Equal => {
                    let old = old_entries.next();
                    let new = new_entries.next();
                    self.compare_entries(old, new, prefix)?;
                }
            }
        }

        Ok(())
    }

    fn compare_entries(
        &mut self,
        old: Option<&TreeEntry>,
        new: Option<&TreeEntry>,
        prefix: &Path,
    ) -> Result<()> {
        let Some(name) = old.or(new).map(|entry| entry.name.as_str()) else {
            return Ok(());
        };
        let path = join_path(prefix, name);

        let old = old.map(TreeEntry::as_database_entry);
        let new = new.map(TreeEntry::as_database_entry);
        let is_tree = old.is_some_and(|e| e.is_tree()) || new.is_some_and(|e| e.is_tree());
        if !self.options.selects(&path, is_tree) {
            return Ok(());
        }

        if old == new && !self.options.include_unmodified {
            return Ok(());
        }

        // a subtree on either side is walked; a blob replaced by a tree (or
        // the reverse) becomes a deletion plus additions
        let old_tree = old.filter(DatabaseEntry::is_tree).map(|e| e.oid);
        let new_tree = new.filter(DatabaseEntry::is_tree).map(|e| e.oid);
        if old_tree.is_some() || new_tree.is_some() {
            self.compare_oids(old_tree.as_ref(), new_tree.as_ref(), &path)?;
        }

        let old_blob = old.filter(|e| !e.is_tree());
        let new_blob = new.filter(|e| !e.is_tree());
        if let Some(delta) = Delta::from_entries(path, old_blob, new_blob) {
            self.deltas.push(delta);
        }

        Ok(())
    }
}

fn attach_hunks(store: &dyn ObjectStore, delta: &mut Delta, context_lines: usize) -> Result<()> {
    if delta.status == DeltaStatus::Unmodified || delta.old_id() == delta.new_id() {
        return Ok(());
    }

    let old = load_content(store, delta.old)?;
    let new = load_content(store, delta.new)?;
    let (Some(old), Some(new)) = (old, new) else {
        return Ok(());
    };

    if is_binary(&old) || is_binary(&new) {
        delta.binary = true;
        return Ok(());
    }

    delta.hunks = diff_lines(&old, &new, context_lines);
    Ok(())
}

/// Content of an entry for line diffing: empty when absent, `None` when the
/// entry has no content in this store
fn load_content(store: &dyn ObjectStore, entry: Option<DatabaseEntry>) -> Result<Option<Bytes>> {
    match entry {
        None => Ok(Some(Bytes::new())),
        Some(entry) if entry.mode.has_content() => {
            Ok(Some(store.lookup_blob(&entry.oid)?.into_content()))
        }
        Some(_) => Ok(None),
    }
}
