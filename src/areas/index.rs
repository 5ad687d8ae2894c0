//! Staging index
//!
//! The index tracks the snapshot that the next commit will record. Cleanly
//! staged paths live at stage 0; a conflicted merge replaces a path's stage 0
//! entry with up to three entries (base, ours, theirs) at stages 1, 2 and 3.
//!
//! ## Data Structures
//!
//! - `entries`: entries keyed by `(path, stage)`, kept in on-disk order
//! - `children`: directory paths mapped to the staged paths below them, used
//!   to drop entries when a file replaces a directory or vice versa

use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::index::checksum::Checksum;
use crate::artifacts::index::index_entry::{ENTRY_BLOCK, IndexEntry, Stage};
use crate::artifacts::index::index_header::IndexHeader;
use crate::artifacts::index::HEADER_SIZE;
use crate::artifacts::merge::merge_result::ConflictEntry;
use crate::artifacts::objects::object_id::HashAlgorithm;
use crate::errors::{Error, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::DerefMut;
use std::path::{Path, PathBuf};

type EntryKey = (PathBuf, Stage);

#[derive(Debug, Clone)]
pub struct Index {
    path: Box<Path>,
    algorithm: HashAlgorithm,
    entries: BTreeMap<EntryKey, IndexEntry>,
    children: BTreeMap<PathBuf, BTreeSet<PathBuf>>,
    changed: bool,
}

impl Index {
    pub fn new(path: Box<Path>, algorithm: HashAlgorithm) -> Self {
        Index {
            path,
            algorithm,
            entries: BTreeMap::new(),
            children: BTreeMap::new(),
            changed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_changed(&self) -> bool {
        self.changed
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.children.clear();
        self.changed = false;
    }

    /// Load the index from disk under a shared lock
    ///
    /// A missing or empty index file loads as an empty index.
    pub fn rehydrate(&mut self) -> Result<()> {
        self.clear();

        if !self.path.exists() {
            return Ok(());
        }

        let mut index_file = std::fs::OpenOptions::new()
            .read(true)
            .open(&self.path)
            .map_err(|e| Error::io(self.path.as_ref(), e))?;
        let mut lock = file_guard::lock(&mut index_file, file_guard::Lock::Shared, 0, 1)
            .map_err(|e| Error::io(self.path.as_ref(), e))?;

        let length = lock
            .deref_mut()
            .metadata()
            .map_err(|e| Error::io(self.path.as_ref(), e))?
            .len();
        if length == 0 {
            return Ok(());
        }

        let mut reader = Checksum::new(lock, self.path.to_path_buf(), self.algorithm);
        let header = IndexHeader::decode(&reader.read(HEADER_SIZE)?)?;
        self.parse_entries(header.entries_count, &mut reader)?;
        reader.verify()?;

        self.changed = false;
        Ok(())
    }

    fn parse_entries(&mut self, entries_count: u32, reader: &mut Checksum) -> Result<()> {
        let fixed = IndexEntry::fixed_size(self.algorithm);
        let min_size = (fixed + 1).div_ceil(ENTRY_BLOCK) * ENTRY_BLOCK;

        for _ in 0..entries_count {
            let mut entry_bytes = reader.read(min_size)?;

            while entry_bytes.last() != Some(&0) {
                entry_bytes.extend(reader.read(ENTRY_BLOCK)?);
            }

            let entry = IndexEntry::decode(&entry_bytes, self.algorithm)?;
            self.store_entry(entry);
        }

        Ok(())
    }

    fn store_entry(&mut self, entry: IndexEntry) {
        for parent in entry.parent_dirs() {
            self.children
                .entry(parent.to_path_buf())
                .or_default()
                .insert(entry.name.clone());
        }

        self.entries
            .insert((entry.name.clone(), entry.stage), entry);
    }

    fn remove_entry(&mut self, path: &Path, stage: Stage) {
        let Some(entry) = self.entries.remove(&(path.to_path_buf(), stage)) else {
            return;
        };

        if self.stages_of(path).next().is_some() {
            return;
        }

        for parent in entry.parent_dirs() {
            if let Some(children) = self.children.get_mut(parent) {
                children.remove(path);
                if children.is_empty() {
                    self.children.remove(parent);
                }
            }
        }
    }

    fn remove_all_stages(&mut self, path: &Path) {
        for stage in [Stage::Merged, Stage::Base, Stage::Ours, Stage::Theirs] {
            self.remove_entry(path, stage);
        }
    }

    fn remove_children(&mut self, path: &Path) {
        if let Some(children) = self.children.remove(path) {
            for child in children {
                self.remove_all_stages(&child);
            }
        }
    }

    /// Drop entries that would clash with a file staged at `path`
    fn discard_conflicts(&mut self, path: &Path) {
        let parents = path
            .ancestors()
            .skip(1)
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .collect::<Vec<_>>();
        for parent in parents {
            self.remove_all_stages(&parent);
        }
        self.remove_children(path);
    }

    fn stages_of<'a>(&'a self, path: &'a Path) -> impl Iterator<Item = &'a IndexEntry> + 'a {
        self.entries
            .range((path.to_path_buf(), Stage::Merged)..=(path.to_path_buf(), Stage::Theirs))
            .map(|(_, entry)| entry)
    }

    /// Stage `entry` at stage 0, resolving any conflict recorded for its path
    pub fn add(&mut self, entry: IndexEntry) {
        let entry = entry.with_stage(Stage::Merged);

        self.discard_conflicts(&entry.name);
        self.remove_all_stages(&entry.name);
        self.store_entry(entry);

        self.changed = true;
    }

    /// Remove a path (all stages) or every path below a directory
    pub fn remove(&mut self, path: &Path) {
        self.remove_all_stages(path);
        self.remove_children(path);

        self.changed = true;
    }

    /// Record a three-way conflict, replacing the path's stage 0 entry
    pub fn add_conflict(&mut self, conflict: &ConflictEntry) {
        let path = conflict.path.as_path();
        self.remove_all_stages(path);

        let sides = [
            (Stage::Base, conflict.ancestor),
            (Stage::Ours, conflict.ours),
            (Stage::Theirs, conflict.theirs),
        ];
        for (stage, side) in sides {
            if let Some(DatabaseEntry { oid, mode }) = side
                && !mode.is_tree()
            {
                self.store_entry(IndexEntry::new(path.to_path_buf(), oid, mode).with_stage(stage));
            }
        }

        self.changed = true;
    }

    pub fn has_conflicts(&self) -> bool {
        self.entries.keys().any(|(_, stage)| *stage != Stage::Merged)
    }

    /// Conflicted paths with their staged sides, in path order
    pub fn conflicts(&self) -> Vec<ConflictEntry> {
        let mut conflicts: BTreeMap<&Path, ConflictEntry> = BTreeMap::new();

        for ((path, stage), entry) in &self.entries {
            if *stage == Stage::Merged {
                continue;
            }

            let conflict = conflicts
                .entry(path.as_path())
                .or_insert_with(|| ConflictEntry::new(path.clone(), None, None, None));
            let side = Some(entry.as_database_entry());
            match stage {
                Stage::Base => conflict.ancestor = side,
                Stage::Ours => conflict.ours = side,
                Stage::Theirs => conflict.theirs = side,
                Stage::Merged => {}
            }
        }

        conflicts.into_values().collect()
    }

    /// Replace every entry, as after a checkout or merge
    pub fn replace_entries(&mut self, entries: impl IntoIterator<Item = IndexEntry>) {
        self.entries.clear();
        self.children.clear();
        for entry in entries {
            self.store_entry(entry);
        }

        self.changed = true;
    }

    pub fn write_updates(&mut self) -> Result<()> {
        let mut encoded = Vec::new();
        for entry in self.entries.values() {
            encoded.push(entry.encode()?);
        }

        let mut index_file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)
            .map_err(|e| Error::io(self.path.as_ref(), e))?;
        let lock = file_guard::lock(&mut index_file, file_guard::Lock::Exclusive, 0, 1)
            .map_err(|e| Error::io(self.path.as_ref(), e))?;

        let mut writer = Checksum::new(lock, self.path.to_path_buf(), self.algorithm);
        writer.write(&IndexHeader::new(encoded.len() as u32).encode())?;
        for entry_bytes in &encoded {
            writer.write(entry_bytes)?;
        }
        writer.write_checksum()?;

        self.changed = false;
        Ok(())
    }

    /// Stage 0 entry of a path
    pub fn entry_by_path(&self, path: &Path) -> Option<&IndexEntry> {
        self.entries.get(&(path.to_path_buf(), Stage::Merged))
    }

    /// Whether the path is staged (at any stage) or is a directory of staged paths
    pub fn is_tracked(&self, path: &Path) -> bool {
        self.stages_of(path).next().is_some() || self.children.contains_key(path)
    }

    /// Cleanly staged entries in path order
    pub fn entries(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries
            .values()
            .filter(|entry| entry.stage == Stage::Merged)
    }

    /// Entries of every stage in path, then stage, order
    pub fn all_entries(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.values()
    }

    /// Distinct tracked paths, conflicted ones included
    pub fn tracked_paths(&self) -> BTreeSet<&Path> {
        self.entries.keys().map(|(path, _)| path.as_path()).collect()
    }
}
