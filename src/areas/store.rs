//! Object store abstraction
//!
//! The diff, graph and merge code only ever reads and writes objects through
//! [`ObjectStore`], so it runs unchanged against the on-disk loose object
//! [`Database`](crate::areas::database::Database), the in-memory
//! [`MemoryStore`] used by tests, or an [`OverlayStore`] that layers
//! not-yet-persisted objects on top of either.
//!
//! Lookups of ids that are absent fail with [`Error::NotFound`]; typed
//! accessors fail with [`Error::UnexpectedKind`] when the id names an object
//! of another kind. Neither is ever retried.

use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object::{Object, Packable};
use crate::artifacts::objects::object_id::{HashAlgorithm, ObjectId};
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::tag::Tag;
use crate::artifacts::objects::tree::{Tree, join_path};
use crate::errors::{Error, Result};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

/// Tags pointing at tags are followed at most this many times
const MAX_PEEL_DEPTH: usize = 16;

pub trait ObjectStore {
    fn hash_algorithm(&self) -> HashAlgorithm;

    fn lookup(&self, oid: &ObjectId) -> Result<Object>;

    /// Store an object, returning its id; writing an existing object is a no-op
    fn write(&self, object: &Object) -> Result<ObjectId>;

    fn contains(&self, oid: &ObjectId) -> Result<bool>;

    /// All stored ids whose hex form starts with `prefix`
    fn find_by_prefix(&self, prefix: &str) -> Result<Vec<ObjectId>>;

    fn lookup_blob(&self, oid: &ObjectId) -> Result<Blob> {
        match self.lookup(oid)? {
            Object::Blob(blob) => Ok(blob),
            other => Err(unexpected(oid, ObjectType::Blob, &other)),
        }
    }

    fn lookup_tree(&self, oid: &ObjectId) -> Result<Tree> {
        match self.lookup(oid)? {
            Object::Tree(tree) => Ok(tree),
            other => Err(unexpected(oid, ObjectType::Tree, &other)),
        }
    }

    fn lookup_commit(&self, oid: &ObjectId) -> Result<Commit> {
        match self.lookup(oid)? {
            Object::Commit(commit) => Ok(commit),
            other => Err(unexpected(oid, ObjectType::Commit, &other)),
        }
    }

    fn lookup_tag(&self, oid: &ObjectId) -> Result<Tag> {
        match self.lookup(oid)? {
            Object::Tag(tag) => Ok(tag),
            other => Err(unexpected(oid, ObjectType::Tag, &other)),
        }
    }

    /// Follow tags and commits down to a tree id
    fn peel_to_tree(&self, oid: &ObjectId) -> Result<ObjectId> {
        let mut current = *oid;

        for _ in 0..MAX_PEEL_DEPTH {
            match self.lookup(&current)? {
                Object::Tree(_) => return Ok(current),
                Object::Commit(commit) => return Ok(commit.tree_oid()),
                Object::Tag(tag) => current = tag.target(),
                other => return Err(unexpected(oid, ObjectType::Tree, &other)),
            }
        }

        Err(Error::corrupt(format!("tag chain starting at {oid} is too deep")))
    }

    /// Follow tags down to a commit id
    fn peel_to_commit(&self, oid: &ObjectId) -> Result<ObjectId> {
        let mut current = *oid;

        for _ in 0..MAX_PEEL_DEPTH {
            match self.lookup(&current)? {
                Object::Commit(_) => return Ok(current),
                Object::Tag(tag) => current = tag.target(),
                other => return Err(unexpected(oid, ObjectType::Commit, &other)),
            }
        }

        Err(Error::corrupt(format!("tag chain starting at {oid} is too deep")))
    }

    /// Every non-tree entry reachable from a tree, keyed by full path
    fn flatten_tree(&self, oid: &ObjectId) -> Result<BTreeMap<PathBuf, DatabaseEntry>> {
        let mut entries = BTreeMap::new();
        let mut pending = vec![(PathBuf::new(), *oid)];

        while let Some((prefix, oid)) = pending.pop() {
            for entry in self.lookup_tree(&oid)?.entries() {
                let path = join_path(&prefix, &entry.name);
                if entry.is_tree() {
                    pending.push((path, entry.oid));
                } else {
                    entries.insert(path, entry.as_database_entry());
                }
            }
        }

        Ok(entries)
    }
}

fn unexpected(oid: &ObjectId, expected: ObjectType, found: &Object) -> Error {
    Error::UnexpectedKind {
        oid: *oid,
        expected,
        found: found.kind(),
    }
}

fn matching_prefix<'a>(
    ids: impl Iterator<Item = &'a ObjectId>,
    prefix: &str,
) -> Vec<ObjectId> {
    let prefix = prefix.to_ascii_lowercase();
    let mut matches = ids
        .filter(|oid| oid.to_string().starts_with(&prefix))
        .copied()
        .collect::<Vec<_>>();
    matches.sort();
    matches
}

/// Objects kept in a hash map
#[derive(Debug, Default)]
pub struct MemoryStore {
    algorithm: HashAlgorithm,
    objects: RefCell<HashMap<ObjectId, Object>>,
}

impl MemoryStore {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        MemoryStore {
            algorithm,
            objects: RefCell::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.objects.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.borrow().is_empty()
    }

    /// Take ownership of every stored object
    pub fn into_objects(self) -> HashMap<ObjectId, Object> {
        self.objects.into_inner()
    }
}

impl ObjectStore for MemoryStore {
    fn hash_algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    fn lookup(&self, oid: &ObjectId) -> Result<Object> {
        self.objects
            .borrow()
            .get(oid)
            .cloned()
            .ok_or(Error::NotFound(*oid))
    }

    fn write(&self, object: &Object) -> Result<ObjectId> {
        let oid = object.object_id(self.algorithm)?;
        self.objects
            .borrow_mut()
            .entry(oid)
            .or_insert_with(|| object.clone());

        Ok(oid)
    }

    fn contains(&self, oid: &ObjectId) -> Result<bool> {
        Ok(self.objects.borrow().contains_key(oid))
    }

    fn find_by_prefix(&self, prefix: &str) -> Result<Vec<ObjectId>> {
        Ok(matching_prefix(self.objects.borrow().keys(), prefix))
    }
}

/// Pending objects layered over a base store
///
/// Reads check the pending layer first; writes only touch the pending layer,
/// so the base store is left untouched until [`OverlayStore::persist`] is
/// called.
pub struct OverlayStore<'s> {
    base: &'s dyn ObjectStore,
    pending: MemoryStore,
}

impl<'s> OverlayStore<'s> {
    pub fn new(base: &'s dyn ObjectStore) -> Self {
        OverlayStore {
            base,
            pending: MemoryStore::new(base.hash_algorithm()),
        }
    }

    /// Overlay pre-populated with `objects`
    pub fn with_objects(
        base: &'s dyn ObjectStore,
        objects: impl IntoIterator<Item = (ObjectId, Object)>,
    ) -> Self {
        let overlay = Self::new(base);
        overlay.pending.objects.borrow_mut().extend(objects);
        overlay
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Write every pending object into the base store
    pub fn persist(self) -> Result<usize> {
        let objects = self.pending.into_objects();
        let count = objects.len();

        for object in objects.values() {
            self.base.write(object)?;
        }

        Ok(count)
    }
}

impl ObjectStore for OverlayStore<'_> {
    fn hash_algorithm(&self) -> HashAlgorithm {
        self.base.hash_algorithm()
    }

    fn lookup(&self, oid: &ObjectId) -> Result<Object> {
        match self.pending.lookup(oid) {
            Err(Error::NotFound(_)) => self.base.lookup(oid),
            found => found,
        }
    }

    fn write(&self, object: &Object) -> Result<ObjectId> {
        self.pending.write(object)
    }

    fn contains(&self, oid: &ObjectId) -> Result<bool> {
        Ok(self.pending.contains(oid)? || self.base.contains(oid)?)
    }

    fn find_by_prefix(&self, prefix: &str) -> Result<Vec<ObjectId>> {
        let mut matches = self.base.find_by_prefix(prefix)?;
        matches.extend(self.pending.find_by_prefix(prefix)?);
        matches.sort();
        matches.dedup();

        Ok(matches)
    }
}

impl std::fmt::Debug for OverlayStore<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayStore")
            .field("pending", &self.pending.len())
            .finish()
    }
}
