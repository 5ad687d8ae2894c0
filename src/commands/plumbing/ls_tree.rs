use crate::areas::repository::Repository;
use crate::areas::store::ObjectStore;
use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::errors::Result;
use std::path::PathBuf;

impl Repository {
    /// Entries of the tree named by `revision`; with `recursive`, every
    /// file below it instead of the top level
    pub fn ls_tree(&self, revision: &str, recursive: bool) -> Result<Vec<(PathBuf, DatabaseEntry)>> {
        let tree_oid = self.resolve_tree(revision)?;

        if recursive {
            return Ok(self.database().flatten_tree(&tree_oid)?.into_iter().collect());
        }

        let tree = self.database().lookup_tree(&tree_oid)?;
        Ok(tree
            .entries()
            .iter()
            .map(|entry| (PathBuf::from(&entry.name), entry.as_database_entry()))
            .collect())
    }
}
