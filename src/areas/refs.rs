//! References (branches, tags, HEAD)
//!
//! References are human-readable names pointing at objects. A ref file holds
//! either a hex object id (direct reference) or `ref: <path>` (symbolic
//! reference). HEAD is normally symbolic, pointing at the current branch.

use crate::artifacts::branch::branch_name::{BranchName, SymRefName};
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::{Error, Result};
use derive_new::new;
use file_guard::Lock;
use std::io::Write;
use std::ops::DerefMut;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Regex pattern for parsing symbolic references
const SYMREF_REGEX: &str = r"^ref: (.+)$";

pub const HEAD_REF_NAME: &str = "HEAD";

/// Symbolic refs chains longer than this are treated as cycles
const MAX_SYMREF_DEPTH: usize = 8;

#[derive(Debug, new)]
pub struct Refs {
    /// Path to the git directory
    path: Box<Path>,
}

#[derive(Debug, Clone)]
enum SymRefOrOid {
    SymRef(SymRefName),
    Oid(ObjectId),
}

impl SymRefOrOid {
    fn read(path: &Path) -> Result<Option<SymRefOrOid>> {
        if !path.is_file() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let content = content.trim();
        if content.is_empty() {
            return Ok(None);
        }

        let symref = regex::Regex::new(SYMREF_REGEX)
            .map_err(|e| Error::corrupt(format!("invalid symref regex: {e}")))?;
        match symref.captures(content) {
            Some(captures) => Ok(Some(SymRefOrOid::SymRef(SymRefName::new(
                captures[1].to_string(),
            )))),
            None => ObjectId::try_parse(content)
                .map(|oid| Some(SymRefOrOid::Oid(oid)))
                .map_err(|_| Error::corrupt(format!("invalid ref file {}", path.display()))),
        }
    }
}

impl Refs {
    /// Follow symbolic refs from `source` (HEAD by default) to the last name
    /// in the chain
    ///
    /// With HEAD pointing at `refs/heads/main`, this returns
    /// `refs/heads/main` even when that branch has no commits yet.
    pub fn current_ref(&self, source: Option<SymRefName>) -> Result<SymRefName> {
        let mut current = source.unwrap_or_else(|| SymRefName::new(HEAD_REF_NAME.to_string()));

        for _ in 0..MAX_SYMREF_DEPTH {
            match SymRefOrOid::read(&self.path.join(current.as_ref_path()))? {
                Some(SymRefOrOid::SymRef(target)) => current = target,
                Some(SymRefOrOid::Oid(_)) | None => return Ok(current),
            }
        }

        Err(Error::corrupt(format!("symbolic ref loop at {current}")))
    }

    /// Current branch, or `None` when HEAD is detached
    pub fn current_branch(&self) -> Result<Option<BranchName>> {
        let current = self.current_ref(None)?;
        if current.is_detached_head() {
            return Ok(None);
        }

        BranchName::from_sym_ref_name(&current).map(Some)
    }

    fn read_symref(&self, path: &Path) -> Result<Option<ObjectId>> {
        let mut path = path.to_path_buf();

        for _ in 0..MAX_SYMREF_DEPTH {
            match SymRefOrOid::read(&path)? {
                Some(SymRefOrOid::SymRef(target)) => path = self.path.join(target.as_ref_path()),
                Some(SymRefOrOid::Oid(oid)) => return Ok(Some(oid)),
                None => return Ok(None),
            }
        }

        Err(Error::corrupt(format!("symbolic ref loop at {}", path.display())))
    }

    pub fn read_head(&self) -> Result<Option<ObjectId>> {
        self.read_symref(&self.head_path())
    }

    /// Point whatever HEAD resolves to (the current branch, or HEAD itself
    /// when detached) at `oid`
    pub fn update_head(&self, oid: ObjectId) -> Result<()> {
        let target = self.current_ref(None)?;
        self.update_ref_file(&self.path.join(target.as_ref_path()), &oid.to_string())
    }

    /// Make HEAD a symbolic ref to `branch`
    pub fn set_head(&self, branch: &BranchName) -> Result<()> {
        self.update_ref_file(
            &self.head_path(),
            &format!("ref: {}", branch.to_sym_ref_name()),
        )
    }

    pub fn update_ref_file(&self, path: &Path, raw_ref: &str) -> Result<()> {
        let parent = path
            .parent()
            .ok_or_else(|| Error::invalid_argument(format!("invalid ref path {}", path.display())))?;
        std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;

        let mut ref_file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|e| Error::io(path, e))?;
        let mut lock =
            file_guard::lock(&mut ref_file, Lock::Exclusive, 0, 1).map_err(|e| Error::io(path, e))?;
        lock.deref_mut()
            .write_all(format!("{raw_ref}\n").as_bytes())
            .map_err(|e| Error::io(path, e))
    }

    /// Resolve a short name the way revisions do: as given, then under
    /// `refs/`, `refs/heads/` and `refs/tags/`
    pub fn read_ref(&self, name: &BranchName) -> Result<Option<ObjectId>> {
        match self.find_path_to_ref(name) {
            Some(path) => self.read_symref(&path),
            None => Ok(None),
        }
    }

    fn find_path_to_ref(&self, name: &BranchName) -> Option<PathBuf> {
        [
            self.path.to_path_buf(),
            self.refs_path(),
            self.heads_path(),
            self.tags_path(),
        ]
        .iter()
        .map(|base_path| base_path.join(name.as_ref()))
        .find(|path| path.is_file())
    }

    pub fn create_branch(&self, name: &BranchName, source_oid: ObjectId) -> Result<()> {
        let branch_path = self.heads_path().join(name.as_ref());

        if branch_path.exists() {
            return Err(Error::invalid_argument(format!(
                "branch {name} already exists"
            )));
        }

        self.update_ref_file(&branch_path, &source_oid.to_string())
    }

    /// Lightweight tag pointing at `oid`
    pub fn create_tag(&self, name: &BranchName, oid: ObjectId) -> Result<()> {
        let tag_path = self.tags_path().join(name.as_ref());

        if tag_path.exists() {
            return Err(Error::invalid_argument(format!("tag {name} already exists")));
        }

        self.update_ref_file(&tag_path, &oid.to_string())
    }

    pub fn list_branches(&self) -> Result<Vec<SymRefName>> {
        let mut branches = WalkDir::new(self.heads_path())
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| {
                let relative_path = entry.path().strip_prefix(self.path.as_ref()).ok()?;
                Some(SymRefName::new(relative_path.to_string_lossy().to_string()))
            })
            .collect::<Vec<_>>();
        branches.sort();

        Ok(branches)
    }

    pub fn head_path(&self) -> PathBuf {
        self.path.join(HEAD_REF_NAME)
    }

    pub fn refs_path(&self) -> PathBuf {
        self.path.join("refs")
    }

    pub fn heads_path(&self) -> PathBuf {
        self.refs_path().join("heads")
    }

    pub fn tags_path(&self) -> PathBuf {
        self.refs_path().join("tags")
    }
}
