//! Tree-shaped snapshots of the index and of the working directory
//!
//! The tree differ only understands trees, so uncommitted states are turned
//! into trees first. Their objects are kept in memory and layered over the
//! repository store with an [`OverlayStore`] for the duration of one diff;
//! nothing is written to the object database.

use crate::areas::index::Index;
use crate::areas::store::{ObjectStore, OverlayStore};
use crate::areas::workspace::Workspace;
use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::file_mode::FileMode;
use crate::artifacts::objects::object::{Object, Packable};
use crate::artifacts::objects::object_id::{HashAlgorithm, ObjectId};
use crate::artifacts::objects::tree::TreeBuilder;
use crate::errors::Result;
use std::collections::BTreeSet;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct WorkingSet {
    root: ObjectId,
    objects: Vec<(ObjectId, Object)>,
}

impl WorkingSet {
    /// Snapshot of the cleanly staged index entries
    pub fn from_index(index: &Index, algorithm: HashAlgorithm) -> Result<Self> {
        let entries = index
            .entries()
            .map(|entry| (entry.name.clone(), entry.as_database_entry()));

        Self::build(entries, Vec::new(), algorithm)
    }

    /// Snapshot of the working directory
    ///
    /// Only paths tracked by the index are included unless
    /// `include_untracked` is set. Files whose cached stat still matches
    /// reuse the staged id without being read.
    pub fn from_workspace(
        workspace: &Workspace,
        index: &Index,
        algorithm: HashAlgorithm,
        include_untracked: bool,
    ) -> Result<Self> {
        let mut entries = Vec::new();
        let mut blobs = Vec::new();

        let candidates: Vec<PathBuf> = if include_untracked {
            let mut paths = workspace
                .list_files(None)?
                .into_iter()
                .collect::<BTreeSet<_>>();
            paths.extend(index.tracked_paths().into_iter().map(PathBuf::from));
            paths.into_iter().collect()
        } else {
            index.tracked_paths().into_iter().map(PathBuf::from).collect()
        };

        for path in candidates {
            let staged = index.entry_by_path(&path);

            if let Some(entry) = staged
                && entry.mode == FileMode::Submodule
            {
                entries.push((path, entry.as_database_entry()));
                continue;
            }

            if !workspace.exists(&path) {
                continue;
            }
            let (metadata, mode) = workspace.stat_file(&path)?;
            if mode.is_tree() {
                continue;
            }

            if let Some(entry) = staged
                && entry.stat_match(&metadata, mode)
                && entry.times_match(&metadata)
            {
                entries.push((path, entry.as_database_entry()));
                continue;
            }

            let blob = Object::Blob(Blob::new(workspace.read_file(&path)?));
            let oid = blob.object_id(algorithm)?;
            entries.push((path, DatabaseEntry::new(oid, mode)));
            blobs.push((oid, blob));
        }

        Self::build(entries, blobs, algorithm)
    }

    fn build(
        entries: impl IntoIterator<Item = (PathBuf, DatabaseEntry)>,
        mut objects: Vec<(ObjectId, Object)>,
        algorithm: HashAlgorithm,
    ) -> Result<Self> {
        let mut builder = TreeBuilder::new();
        for (path, entry) in entries {
            builder.insert(&path, entry)?;
        }

        let built = builder.build(algorithm)?;
        objects.extend(
            built
                .trees
                .into_iter()
                .map(|(oid, tree)| (oid, Object::Tree(tree))),
        );

        Ok(WorkingSet {
            root: built.root,
            objects,
        })
    }

    /// Id of the root tree
    pub fn root(&self) -> ObjectId {
        self.root
    }

    /// In-memory trees and blobs making up the snapshot
    pub fn objects(&self) -> &[(ObjectId, Object)] {
        &self.objects
    }

    /// Store that resolves this snapshot's objects on top of `base`
    pub fn overlay<'s>(&self, base: &'s dyn ObjectStore) -> OverlayStore<'s> {
        OverlayStore::with_objects(base, self.objects.iter().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::areas::store::MemoryStore;
    use crate::artifacts::index::index_entry::IndexEntry;
    use assert_fs::TempDir;
    use assert_fs::prelude::*;
    use pretty_assertions::assert_eq;

    fn staged_index(dir: &TempDir, store: &MemoryStore, files: &[(&str, &str)]) -> Index {
        let mut index = Index::new(dir.path().join("index").into(), HashAlgorithm::Sha1);
        for (path, content) in files {
            let oid = store.write(&Object::Blob(Blob::from(*content))).unwrap();
            index.add(IndexEntry::new(PathBuf::from(path), oid, FileMode::Blob));
        }
        index
    }

    #[test]
    fn index_snapshot_nests_directories() {
        let dir = TempDir::new().unwrap();
        let store = MemoryStore::new(HashAlgorithm::Sha1);
        let index = staged_index(&dir, &store, &[("a.txt", "a"), ("src/lib.rs", "lib")]);

        let working_set = WorkingSet::from_index(&index, HashAlgorithm::Sha1).unwrap();
        let overlay = working_set.overlay(&store);

        let root = overlay.lookup_tree(&working_set.root()).unwrap();
        assert_eq!(root.len(), 2);
        assert!(root.entry("src").unwrap().is_tree());
    }

    #[test]
    fn workspace_snapshot_skips_untracked_files_by_default() {
        let dir = TempDir::new().unwrap();
        let work = dir.child("work");
        work.child("tracked.txt").write_str("changed\n").unwrap();
        work.child("untracked.txt").write_str("new\n").unwrap();
        let store = MemoryStore::new(HashAlgorithm::Sha1);
        let index = staged_index(&dir, &store, &[("tracked.txt", "original\n")]);
        let workspace = Workspace::new(work.path().into());

        let tracked_only =
            WorkingSet::from_workspace(&workspace, &index, HashAlgorithm::Sha1, false).unwrap();
        let everything =
            WorkingSet::from_workspace(&workspace, &index, HashAlgorithm::Sha1, true).unwrap();

        let overlay = tracked_only.overlay(&store);
        let root = overlay.lookup_tree(&tracked_only.root()).unwrap();
        assert_eq!(root.len(), 1);
        let entry = root.entry("tracked.txt").unwrap();
        assert_eq!(overlay.lookup_blob(&entry.oid).unwrap(), Blob::from("changed\n"));

        let overlay = everything.overlay(&store);
        assert_eq!(overlay.lookup_tree(&everything.root()).unwrap().len(), 2);
    }
}
