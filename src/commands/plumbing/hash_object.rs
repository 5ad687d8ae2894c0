use crate::areas::repository::Repository;
use crate::areas::store::ObjectStore;
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::object::{Object, Packable};
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::Result;
use std::path::Path;

impl Repository {
    /// Blob id of a workspace file, storing the blob when `write` is set
    pub fn hash_object(&self, path: &Path, write: bool) -> Result<ObjectId> {
        let path = self.relative_path(path)?;
        let blob = Object::Blob(Blob::new(self.workspace().read_file(&path)?));

        if write {
            self.database().write(&blob)
        } else {
            blob.object_id(self.hash_algorithm())
        }
    }
}
