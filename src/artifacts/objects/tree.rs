//! Tree object
//!
//! Trees represent directory snapshots. They hold named entries for files
//! (blobs), symlinks, submodules and subdirectories (other trees).
//!
//! ## Format
//!
//! On disk: `tree <size>\0<entries>`
//! Each entry: `<mode> <name>\0<raw id bytes>`
//!
//! Entries are kept sorted by name and names are unique within a tree, so
//! two trees can be compared with a single linear two-pointer pass.
//!
//! ## Tree Building
//!
//! [`TreeBuilder`] turns a flat list of `(path, entry)` pairs, such as the
//! staged index or a merge result, into nested trees.

use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::objects::file_mode::FileMode;
use crate::artifacts::objects::object::{Packable, Unpackable};
use crate::artifacts::objects::object_id::{HashAlgorithm, ObjectId};
use crate::artifacts::objects::object_type::ObjectType;
use crate::errors::{Error, Result};
use bytes::Bytes;
use std::collections::BTreeMap;
use std::io::BufRead;
use std::path::{Component, Path, PathBuf};

/// One named entry of a tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub name: String,
    pub mode: FileMode,
    pub oid: ObjectId,
}

impl TreeEntry {
    pub fn new(name: impl Into<String>, mode: FileMode, oid: ObjectId) -> Self {
        TreeEntry {
            name: name.into(),
            mode,
            oid,
        }
    }

    pub fn is_tree(&self) -> bool {
        self.mode.is_tree()
    }

    pub fn as_database_entry(&self) -> DatabaseEntry {
        DatabaseEntry::new(self.oid, self.mode)
    }
}

/// Directory snapshot: entries sorted by name with unique names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tree {
    entries: Vec<TreeEntry>,
}

impl Tree {
    /// Build a tree from entries in any order
    ///
    /// Fails when a name is invalid or appears twice.
    pub fn new(mut entries: Vec<TreeEntry>) -> Result<Self> {
        for entry in &entries {
            validate_entry_name(&entry.name)?;
        }

        entries.sort_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));
        if let Some(pair) = entries.windows(2).find(|pair| pair[0].name == pair[1].name) {
            return Err(Error::invalid_argument(format!(
                "duplicate tree entry '{}'",
                pair[0].name
            )));
        }

        Ok(Tree { entries })
    }

    pub fn entries(&self) -> &[TreeEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<TreeEntry> {
        self.entries
    }

    pub fn entry(&self, name: &str) -> Option<&TreeEntry> {
        self.entries
            .binary_search_by(|entry| entry.name.as_bytes().cmp(name.as_bytes()))
            .ok()
            .map(|index| &self.entries[index])
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn display(&self) -> String {
        self.entries
            .iter()
            .map(|entry| {
                let object_type = match entry.mode {
                    FileMode::Tree => ObjectType::Tree.as_str(),
                    FileMode::Submodule => ObjectType::Commit.as_str(),
                    _ => ObjectType::Blob.as_str(),
                };
                format!(
                    "{:0>6} {} {}\t{}",
                    entry.mode.as_str(),
                    object_type,
                    entry.oid,
                    entry.name
                )
            })
            .collect::<Vec<String>>()
            .join("\n")
    }
}

fn validate_entry_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains('/') || name.contains('\0')
    {
        return Err(Error::invalid_argument(format!(
            "invalid tree entry name '{name}'"
        )));
    }

    Ok(())
}

impl Packable for Tree {
    fn object_type(&self) -> ObjectType {
        ObjectType::Tree
    }

    fn body(&self) -> Result<Bytes> {
        let mut content = Vec::new();

        for entry in &self.entries {
            let header = format!("{:o} {}", entry.mode.as_u32(), entry.name);
            content.extend_from_slice(header.as_bytes());
            content.push(0);
            entry
                .oid
                .write_raw_to(&mut content)
                .map_err(|e| Error::corrupt(format!("cannot encode tree entry: {e}")))?;
        }

        Ok(Bytes::from(content))
    }
}

impl Unpackable for Tree {
    fn deserialize(reader: impl BufRead, algorithm: HashAlgorithm) -> Result<Self> {
        let mut entries = Vec::new();
        let mut reader = reader;

        // Reuse scratch buffers to reduce allocs
        let mut mode_bytes = Vec::new();
        let mut name_bytes = Vec::new();

        loop {
            mode_bytes.clear();
            // Read "mode " (space-delimited)
            let n = reader
                .read_until(b' ', &mut mode_bytes)
                .map_err(|e| Error::corrupt(format!("unreadable tree entry: {e}")))?;
            if n == 0 {
                break; // clean EOF: no more entries
            }
            if mode_bytes.pop() != Some(b' ') {
                return Err(Error::corrupt("unexpected EOF in tree entry mode"));
            }

            let mode_str = std::str::from_utf8(&mode_bytes)
                .map_err(|_| Error::corrupt("tree entry mode is not utf-8"))?;
            let mode = FileMode::from_octal_str(mode_str)?;

            // Read "name\0"
            name_bytes.clear();
            reader
                .read_until(b'\0', &mut name_bytes)
                .map_err(|e| Error::corrupt(format!("unreadable tree entry: {e}")))?;
            if name_bytes.pop() != Some(b'\0') {
                return Err(Error::corrupt("unexpected EOF in tree entry name"));
            }
            let name = std::str::from_utf8(&name_bytes)
                .map_err(|_| Error::corrupt("tree entry name is not utf-8"))?
                .to_owned();

            let oid = ObjectId::read_raw_from(algorithm, &mut reader)?;

            entries.push(TreeEntry::new(name, mode, oid));
        }

        Tree::new(entries).map_err(|e| Error::corrupt(e.to_string()))
    }
}

#[derive(Debug, Default)]
struct DirectoryNode {
    files: BTreeMap<String, DatabaseEntry>,
    directories: BTreeMap<String, DirectoryNode>,
}

/// Trees produced by [`TreeBuilder::build`], children before parents
#[derive(Debug, Clone)]
pub struct BuiltTree {
    pub root: ObjectId,
    pub trees: Vec<(ObjectId, Tree)>,
}

/// Builds nested trees from a flat list of paths
#[derive(Debug, Default)]
pub struct TreeBuilder {
    root: DirectoryNode,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a leaf entry at `path`, creating intermediate directories
    ///
    /// A path cannot be both a leaf and a directory.
    pub fn insert(&mut self, path: &Path, entry: DatabaseEntry) -> Result<()> {
        let components = path_components(path)?;
        let (name, parents) = components
            .split_last()
            .ok_or_else(|| Error::invalid_argument("cannot insert an empty path"))?;

        let mut node = &mut self.root;
        for parent in parents {
            if node.files.contains_key(*parent) {
                return Err(Error::invalid_argument(format!(
                    "'{}' is both a file and a directory",
                    path.display()
                )));
            }
            node = node.directories.entry(parent.to_string()).or_default();
        }

        if node.directories.contains_key(*name) {
            return Err(Error::invalid_argument(format!(
                "'{}' is both a file and a directory",
                path.display()
            )));
        }
        node.files.insert(name.to_string(), entry);

        Ok(())
    }

    /// Hash every directory bottom-up
    pub fn build(self, algorithm: HashAlgorithm) -> Result<BuiltTree> {
        let mut trees = Vec::new();
        let root = Self::build_node(self.root, algorithm, &mut trees)?;

        Ok(BuiltTree { root, trees })
    }

    fn build_node(
        node: DirectoryNode,
        algorithm: HashAlgorithm,
        trees: &mut Vec<(ObjectId, Tree)>,
    ) -> Result<ObjectId> {
        let mut entries = node
            .files
            .into_iter()
            .map(|(name, entry)| TreeEntry::new(name, entry.mode, entry.oid))
            .collect::<Vec<_>>();

        for (name, child) in node.directories {
            let child_oid = Self::build_node(child, algorithm, trees)?;
            entries.push(TreeEntry::new(name, FileMode::Tree, child_oid));
        }

        let tree = Tree::new(entries)?;
        let oid = tree.object_id(algorithm)?;
        trees.push((oid, tree));

        Ok(oid)
    }
}

/// Split a relative path into validated utf-8 components
pub fn path_components(path: &Path) -> Result<Vec<&str>> {
    path.components()
        .map(|component| match component {
            Component::Normal(name) => name
                .to_str()
                .ok_or_else(|| Error::invalid_argument(format!("non utf-8 path {path:?}"))),
            _ => Err(Error::invalid_argument(format!(
                "path '{}' must be relative and normalized",
                path.display()
            ))),
        })
        .collect()
}

/// Join a tree-relative prefix and an entry name
pub fn join_path(prefix: &Path, name: &str) -> PathBuf {
    if prefix.as_os_str().is_empty() {
        PathBuf::from(name)
    } else {
        prefix.join(name)
    }
}
