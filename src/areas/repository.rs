use crate::areas::config::Config;
use crate::areas::database::Database;
use crate::areas::index::Index;
use crate::areas::refs::Refs;
use crate::areas::store::ObjectStore;
use crate::areas::workspace::Workspace;
use crate::artifacts::objects::object_id::{HashAlgorithm, ObjectId};
use crate::errors::{Error, Result};
use std::cell::{RefCell, RefMut};
use std::path::{Path, PathBuf};

pub const GIT_DIR: &str = ".git";
pub const CONFIG_FILE: &str = "config";
pub const INDEX_FILE: &str = "index";
pub const OBJECTS_DIR: &str = "objects";
/// Second parent of a merge stopped by conflicts
pub const MERGE_HEAD_FILE: &str = "MERGE_HEAD";

/// A working directory with its `.git` directory
///
/// The index is loaded lazily by each command through [`Repository::index`];
/// one command at a time is assumed to mutate a repository.
pub struct Repository {
    path: Box<Path>,
    config: Config,
    index: RefCell<Index>,
    database: Database,
    workspace: Workspace,
    refs: Refs,
}

impl Repository {
    /// Open the repository whose worktree root is `path`
    pub fn open(path: &Path) -> Result<Self> {
        let path = path.canonicalize().map_err(|e| Error::io(path, e))?;
        let git_path = path.join(GIT_DIR);

        if !git_path.is_dir() {
            return Err(Error::invalid_argument(format!(
                "not a repository: {}",
                path.display()
            )));
        }

        let config = Config::load(&git_path.join(CONFIG_FILE))?;
        Ok(Self::with_config(path, config))
    }

    pub(crate) fn with_config(path: PathBuf, config: Config) -> Self {
        let git_path = path.join(GIT_DIR);
        let algorithm = config.object_format;

        Repository {
            index: RefCell::new(Index::new(
                git_path.join(INDEX_FILE).into_boxed_path(),
                algorithm,
            )),
            database: Database::new(git_path.join(OBJECTS_DIR).into_boxed_path(), algorithm),
            workspace: Workspace::new(path.clone().into_boxed_path()),
            refs: Refs::new(git_path.into_boxed_path()),
            path: path.into_boxed_path(),
            config,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn git_path(&self) -> PathBuf {
        self.path.join(GIT_DIR)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn hash_algorithm(&self) -> HashAlgorithm {
        self.config.object_format
    }

    /// The staging index, as last loaded
    ///
    /// Panics if borrowed twice; commands hold it for one operation only.
    pub fn index(&self) -> RefMut<'_, Index> {
        self.index.borrow_mut()
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn store(&self) -> &dyn ObjectStore {
        &self.database
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn refs(&self) -> &Refs {
        &self.refs
    }

    /// Commit HEAD points at, or `None` on an unborn branch
    pub fn head_commit(&self) -> Result<Option<ObjectId>> {
        match self.refs.read_head()? {
            Some(oid) => self.database.peel_to_commit(&oid).map(Some),
            None => Ok(None),
        }
    }

    /// Root tree of the HEAD commit
    pub fn head_tree(&self) -> Result<Option<ObjectId>> {
        match self.head_commit()? {
            Some(commit) => Ok(Some(self.database.lookup_commit(&commit)?.tree_oid())),
            None => Ok(None),
        }
    }

    pub(crate) fn merge_head_path(&self) -> PathBuf {
        self.git_path().join(MERGE_HEAD_FILE)
    }

    /// Pending second parent recorded by a conflicted merge
    pub fn merge_head(&self) -> Result<Option<ObjectId>> {
        let path = self.merge_head_path();
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
        ObjectId::try_parse(content.trim())
            .map(Some)
            .map_err(|_| Error::corrupt(format!("invalid {}", path.display())))
    }
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("path", &self.path)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
