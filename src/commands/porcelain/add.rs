use crate::areas::repository::Repository;
use crate::areas::store::ObjectStore;
use crate::artifacts::index::index_entry::IndexEntry;
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::object::Object;
use crate::errors::{Error, Result};
use std::path::{Component, Path, PathBuf};

impl Repository {
    /// Stage files, expanding directories; tracked paths at or below a
    /// named path that no longer exist are unstaged
    pub fn add(&self, paths: &[PathBuf]) -> Result<()> {
        let mut index = self.index();
        index.rehydrate()?;

        for path in paths {
            let path = self.relative_path(path)?;

            if !self.workspace().exists(&path) {
                if index.is_tracked(&path) {
                    index.remove(&path);
                    continue;
                }
                return Err(Error::invalid_argument(format!(
                    "pathspec '{}' did not match any files",
                    path.display()
                )));
            }

            let root = (!path.as_os_str().is_empty()).then_some(path.as_path());
            let files = self.workspace().list_files(root)?;

            let vanished = index
                .tracked_paths()
                .into_iter()
                .filter(|tracked| tracked.starts_with(&path))
                .filter(|tracked| files.binary_search_by(|file| file.as_path().cmp(tracked)).is_err())
                .map(Path::to_path_buf)
                .collect::<Vec<_>>();
            for tracked in vanished {
                tracing::debug!(path = %tracked.display(), "unstaged");
                index.remove(&tracked);
            }

            for file in files {
                let data = self.workspace().read_file(&file)?;
                let (metadata, mode) = self.workspace().stat_file(&file)?;

                let oid = self.database().write(&Object::Blob(Blob::new(data)))?;
                tracing::debug!(path = %file.display(), %oid, "staged");
                index.add(IndexEntry::new(file, oid, mode).with_metadata(metadata));
            }
        }

        index.write_updates()
    }

    /// `path` relative to the worktree root
    pub(crate) fn relative_path(&self, path: &Path) -> Result<PathBuf> {
        if path.is_relative() {
            return Ok(path
                .components()
                .filter(|component| !matches!(component, Component::CurDir))
                .collect());
        }

        path.strip_prefix(self.path())
            .map(Path::to_path_buf)
            .map_err(|_| {
                Error::invalid_argument(format!(
                    "{} is outside repository at {}",
                    path.display(),
                    self.path().display()
                ))
            })
    }
}
