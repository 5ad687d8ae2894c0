use crate::areas::config::Config;
use crate::areas::repository::{CONFIG_FILE, GIT_DIR, Repository};
use crate::artifacts::branch::branch_name::BranchName;
use crate::artifacts::objects::object_id::HashAlgorithm;
use crate::errors::{Error, Result};
use std::fs;
use std::path::Path;

pub const DEFAULT_BRANCH: &str = "main";

impl Repository {
    /// Create an empty repository at `path` (created if needed), with HEAD
    /// on an unborn `main` branch
    pub fn init(path: &Path, algorithm: HashAlgorithm) -> Result<Repository> {
        fs::create_dir_all(path).map_err(|e| Error::io(path, e))?;
        let path = path.canonicalize().map_err(|e| Error::io(path, e))?;
        let git_path = path.join(GIT_DIR);

        if git_path.join(CONFIG_FILE).exists() {
            return Err(Error::invalid_argument(format!(
                "repository already exists in {}",
                path.display()
            )));
        }

        let config = Config::new(algorithm);
        let repository = Repository::with_config(path, config);

        for dir in [
            repository.database().objects_path().to_path_buf(),
            repository.refs().heads_path(),
            repository.refs().tags_path(),
        ] {
            fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
        }

        config.save(&git_path.join(CONFIG_FILE))?;
        repository
            .refs()
            .set_head(&BranchName::try_parse(DEFAULT_BRANCH)?)?;

        tracing::info!(
            path = %repository.path().display(),
            format = algorithm.as_str(),
            "initialized repository"
        );
        Ok(repository)
    }
}
