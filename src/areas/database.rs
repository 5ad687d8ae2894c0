use crate::areas::store::ObjectStore;
use crate::artifacts::objects::object::{Object, Packable};
use crate::artifacts::objects::object_id::{HashAlgorithm, ObjectId};
use crate::errors::{Error, Result};
use bytes::Bytes;
use fake::rand;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Loose object database: one zlib-compressed file per object
#[derive(Debug)]
pub struct Database {
    path: Box<Path>,
    algorithm: HashAlgorithm,
}

// TODO: read packfiles so repositories cloned by other tools can be opened
impl Database {
    pub fn new(path: Box<Path>, algorithm: HashAlgorithm) -> Self {
        Database { path, algorithm }
    }

    pub fn objects_path(&self) -> &Path {
        &self.path
    }

    /// Raw decompressed encoding of an object, header included
    pub fn load(&self, oid: &ObjectId) -> Result<Bytes> {
        let object_path = self.path.join(oid.to_path());

        if !object_path.exists() {
            return Err(Error::NotFound(*oid));
        }

        self.read_object(&object_path)
    }

    fn read_object(&self, object_path: &Path) -> Result<Bytes> {
        let compressed = std::fs::read(object_path).map_err(|e| Error::io(object_path, e))?;

        Self::decompress(&compressed)
            .map_err(|e| Error::corrupt(format!("{}: {e}", object_path.display())))
    }

    fn write_object(&self, object_path: &Path, content: Bytes) -> Result<()> {
        let object_dir = object_path
            .parent()
            .ok_or_else(|| Error::corrupt(format!("invalid object path {}", object_path.display())))?;
        std::fs::create_dir_all(object_dir).map_err(|e| Error::io(object_dir, e))?;

        let temp_object_path = object_dir.join(Self::generate_temp_name());
        let compressed = Self::compress(&content).map_err(|e| Error::io(&temp_object_path, e))?;

        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_object_path)
            .map_err(|e| Error::io(&temp_object_path, e))?;
        file.write_all(&compressed)
            .map_err(|e| Error::io(&temp_object_path, e))?;

        // rename the temp file into place so readers never see a partial object
        std::fs::rename(&temp_object_path, object_path).map_err(|e| {
            let _ = std::fs::remove_file(&temp_object_path);
            Error::io(object_path, e)
        })
    }

    fn compress(data: &[u8]) -> std::io::Result<Vec<u8>> {
        let mut encoder =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(data)?;
        encoder.finish()
    }

    fn decompress(data: &[u8]) -> std::io::Result<Bytes> {
        let mut decoder = flate2::read::ZlibDecoder::new(data);
        let mut decompressed = Vec::new();
        decoder.read_to_end(&mut decompressed)?;

        Ok(decompressed.into())
    }

    fn generate_temp_name() -> String {
        format!("tmp-obj-{}", rand::random::<u32>())
    }

    fn object_path(&self, oid: &ObjectId) -> PathBuf {
        self.path.join(oid.to_path())
    }

    fn fanout_entries(&self, dir_name: &str) -> Result<Vec<ObjectId>> {
        let dir_path = self.path.join(dir_name);
        if !dir_path.is_dir() {
            return Ok(Vec::new());
        }

        let mut oids = Vec::new();
        for entry in std::fs::read_dir(&dir_path).map_err(|e| Error::io(&dir_path, e))? {
            let entry = entry.map_err(|e| Error::io(&dir_path, e))?;
            let file_name = entry.file_name();
            // temp files and other strays simply fail to parse
            if let Ok(oid) = ObjectId::try_parse(&format!("{dir_name}{}", file_name.to_string_lossy())) {
                oids.push(oid);
            }
        }

        Ok(oids)
    }
}

impl ObjectStore for Database {
    fn hash_algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    fn lookup(&self, oid: &ObjectId) -> Result<Object> {
        let data = self.load(oid)?;
        let object = Object::parse(&data, self.algorithm)?;

        tracing::trace!(%oid, kind = %object.kind(), "loaded object");
        Ok(object)
    }

    fn write(&self, object: &Object) -> Result<ObjectId> {
        let content = object.serialize()?;
        let oid = self.algorithm.digest(&content);
        let object_path = self.object_path(&oid);

        if !object_path.exists() {
            self.write_object(&object_path, content)?;
            tracing::trace!(%oid, kind = %object.kind(), "stored object");
        }

        Ok(oid)
    }

    fn contains(&self, oid: &ObjectId) -> Result<bool> {
        Ok(self.object_path(oid).exists())
    }

    /// Abbreviated ids of two or more characters only scan one fan-out
    /// directory; shorter prefixes scan all of them.
    fn find_by_prefix(&self, prefix: &str) -> Result<Vec<ObjectId>> {
        let prefix = prefix.to_ascii_lowercase();

        let mut matches = if prefix.len() >= 2 {
            self.fanout_entries(&prefix[..2])?
        } else {
            let mut all = Vec::new();
            for i in 0..=255u8 {
                all.extend(self.fanout_entries(&format!("{i:02x}"))?);
            }
            all
        };

        matches.retain(|oid| oid.to_string().starts_with(&prefix));
        matches.sort();

        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::objects::blob::Blob;
    use assert_fs::TempDir;
    use pretty_assertions::assert_eq;

    #[test]
    fn stores_and_loads_compressed_objects() {
        let dir = TempDir::new().unwrap();
        let database = Database::new(dir.path().into(), HashAlgorithm::Sha1);

        let blob = Object::Blob(Blob::from("hello\n"));
        let oid = database.write(&blob).unwrap();

        assert_eq!(oid.to_string(), "ce013625030ba8dba906f756967f9e9ca394464a");
        assert!(dir.path().join(oid.to_path()).is_file());
        assert_eq!(database.lookup(&oid).unwrap(), blob);
        assert_eq!(database.find_by_prefix("ce0136").unwrap(), vec![oid]);
    }

    #[test]
    fn missing_objects_are_not_found() {
        let dir = TempDir::new().unwrap();
        let database = Database::new(dir.path().into(), HashAlgorithm::Sha256);
        let oid = HashAlgorithm::Sha256.digest(b"missing");

        assert!(matches!(database.lookup(&oid), Err(Error::NotFound(_))));
        assert!(!database.contains(&oid).unwrap());
    }
}
