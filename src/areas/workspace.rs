use crate::artifacts::index::index_entry::{EntryMetadata, mode_for_path};
use crate::artifacts::objects::file_mode::FileMode;
use crate::errors::{Error, Result};
use bytes::Bytes;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

const IGNORED_PATHS: [&str; 1] = [".git"];

/// The working directory
#[derive(Debug)]
pub struct Workspace {
    path: Box<Path>,
}

impl Workspace {
    pub fn new(path: Box<Path>) -> Self {
        Workspace { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every file below the root (or below `root_file_path`), relative to
    /// the workspace root, in path order
    pub fn list_files(&self, root_file_path: Option<&Path>) -> Result<Vec<PathBuf>> {
        let root = match root_file_path {
            Some(path) => self.path.join(path),
            None => self.path.to_path_buf(),
        };

        if !root.exists() && std::fs::symlink_metadata(&root).is_err() {
            return Err(Error::invalid_argument(format!(
                "pathspec '{}' did not match any files",
                root.display()
            )));
        }

        let mut files = WalkDir::new(&root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !Self::is_ignored(entry.path()))
            .filter_map(|entry| entry.ok())
            .filter(|entry| !entry.file_type().is_dir())
            .filter_map(|entry| {
                entry
                    .path()
                    .strip_prefix(self.path.as_ref())
                    .ok()
                    .map(Path::to_path_buf)
            })
            .collect::<Vec<_>>();
        files.sort();

        Ok(files)
    }

    fn is_ignored(path: &Path) -> bool {
        path.components().any(|component| match component {
            Component::Normal(name) => IGNORED_PATHS.contains(&name.to_string_lossy().as_ref()),
            _ => false,
        })
    }

    pub fn exists(&self, file_path: &Path) -> bool {
        std::fs::symlink_metadata(self.path.join(file_path)).is_ok()
    }

    /// Raw file content; for symlinks, the link target
    pub fn read_file(&self, file_path: &Path) -> Result<Bytes> {
        let path = self.path.join(file_path);
        let metadata = std::fs::symlink_metadata(&path).map_err(|e| Error::io(&path, e))?;

        if metadata.file_type().is_symlink() {
            let target = std::fs::read_link(&path).map_err(|e| Error::io(&path, e))?;
            return Ok(Bytes::from(target.to_string_lossy().into_owned()));
        }

        std::fs::read(&path)
            .map(Bytes::from)
            .map_err(|e| Error::io(&path, e))
    }

    pub fn stat_file(&self, file_path: &Path) -> Result<(EntryMetadata, FileMode)> {
        let path = self.path.join(file_path);
        let metadata = std::fs::symlink_metadata(&path).map_err(|e| Error::io(&path, e))?;

        Ok((EntryMetadata::from(&metadata), mode_for_path(&path, &metadata)))
    }

    /// Write `data` at `file_path` with the given mode, replacing whatever
    /// file or directory occupies the path or its parents
    pub fn write_file(&self, file_path: &Path, data: &[u8], mode: FileMode) -> Result<()> {
        let path = self.path.join(file_path);

        if let Some(parent) = file_path.parent() {
            self.make_parent_dirs(parent)?;
        }
        self.remove_path(&path)?;

        match mode {
            FileMode::Symlink => {
                let target = String::from_utf8_lossy(data).into_owned();
                std::os::unix::fs::symlink(target, &path).map_err(|e| Error::io(&path, e))?;
            }
            _ => {
                let mut file = std::fs::OpenOptions::new()
                    .write(true)
                    .create(true)
                    .truncate(true)
                    .open(&path)
                    .map_err(|e| Error::io(&path, e))?;
                file.write_all(data).map_err(|e| Error::io(&path, e))?;

                use std::os::unix::fs::PermissionsExt;
                let permissions = std::fs::Permissions::from_mode(match mode {
                    FileMode::Executable => 0o755,
                    _ => 0o644,
                });
                std::fs::set_permissions(&path, permissions).map_err(|e| Error::io(&path, e))?;
            }
        }

        Ok(())
    }

    /// Remove a file and any parent directories left empty
    pub fn remove_file(&self, file_path: &Path) -> Result<()> {
        let path = self.path.join(file_path);
        self.remove_path(&path)?;

        let mut parent = file_path.parent();
        while let Some(dir) = parent {
            if dir.as_os_str().is_empty() {
                break;
            }
            let dir_path = self.path.join(dir);
            let is_empty = std::fs::read_dir(&dir_path)
                .map(|mut entries| entries.next().is_none())
                .unwrap_or(false);
            if !is_empty {
                break;
            }
            std::fs::remove_dir(&dir_path).map_err(|e| Error::io(&dir_path, e))?;
            parent = dir.parent();
        }

        Ok(())
    }

    fn remove_path(&self, path: &Path) -> Result<()> {
        match std::fs::symlink_metadata(path) {
            Ok(metadata) if metadata.is_dir() => {
                std::fs::remove_dir_all(path).map_err(|e| Error::io(path, e))
            }
            Ok(_) => std::fs::remove_file(path).map_err(|e| Error::io(path, e)),
            Err(_) => Ok(()),
        }
    }

    fn make_parent_dirs(&self, dir: &Path) -> Result<()> {
        let mut current = self.path.to_path_buf();

        for component in dir.components() {
            current.push(component);
            match std::fs::symlink_metadata(&current) {
                Ok(metadata) if metadata.is_dir() => continue,
                Ok(_) => {
                    std::fs::remove_file(&current).map_err(|e| Error::io(&current, e))?;
                }
                Err(_) => {}
            }
            std::fs::create_dir(&current).map_err(|e| Error::io(&current, e))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::TempDir;
    use assert_fs::prelude::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn lists_files_outside_the_git_dir() {
        let dir = TempDir::new().unwrap();
        dir.child("a.txt").write_str("a").unwrap();
        dir.child("src/b.rs").write_str("b").unwrap();
        dir.child(".git/HEAD").write_str("ref: refs/heads/main").unwrap();

        let workspace = Workspace::new(dir.path().into());

        assert_eq!(
            workspace.list_files(None).unwrap(),
            vec![PathBuf::from("a.txt"), PathBuf::from("src/b.rs")]
        );
    }

    #[test]
    fn writing_a_file_replaces_a_directory() {
        let dir = TempDir::new().unwrap();
        dir.child("x/inner.txt").write_str("inner").unwrap();
        let workspace = Workspace::new(dir.path().into());

        workspace
            .write_file(Path::new("x"), b"now a file\n", FileMode::Executable)
            .unwrap();

        dir.child("x").assert("now a file\n");
        let (_, mode) = workspace.stat_file(Path::new("x")).unwrap();
        assert_eq!(mode, FileMode::Executable);
    }

    #[test]
    fn removing_the_last_file_prunes_directories() {
        let dir = TempDir::new().unwrap();
        dir.child("a/b/c.txt").write_str("c").unwrap();
        let workspace = Workspace::new(dir.path().into());

        workspace.remove_file(Path::new("a/b/c.txt")).unwrap();

        assert!(!dir.child("a").exists());
    }
}
