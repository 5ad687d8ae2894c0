use crate::artifacts::objects::object_id::HashAlgorithm;
use crate::errors::{Error, Result};
use file_guard::FileGuard;
use sha1::Digest;
use std::io::{Read, Write};
use std::ops::DerefMut;
use std::path::PathBuf;

#[derive(Debug, Clone)]
enum Hasher {
    Sha1(sha1::Sha1),
    Sha256(sha2::Sha256),
}

impl Hasher {
    fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Sha1 => Hasher::Sha1(sha1::Sha1::new()),
            HashAlgorithm::Sha256 => Hasher::Sha256(sha2::Sha256::new()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Hasher::Sha1(hasher) => hasher.update(data),
            Hasher::Sha256(hasher) => hasher.update(data),
        }
    }

    fn finalize(&self) -> Vec<u8> {
        match self.clone() {
            Hasher::Sha1(hasher) => hasher.finalize().to_vec(),
            Hasher::Sha256(hasher) => hasher.finalize().to_vec(),
        }
    }
}

/// Hashes everything read from or written to a locked index file
pub struct Checksum<'f> {
    file: FileGuard<&'f mut std::fs::File>,
    path: PathBuf,
    digest: Hasher,
    algorithm: HashAlgorithm,
}

impl<'f> Checksum<'f> {
    pub(crate) fn new(
        file: FileGuard<&'f mut std::fs::File>,
        path: PathBuf,
        algorithm: HashAlgorithm,
    ) -> Self {
        Checksum {
            file,
            path,
            digest: Hasher::new(algorithm),
            algorithm,
        }
    }

    pub(crate) fn read(&mut self, size: usize) -> Result<Vec<u8>> {
        let mut buffer = vec![0; size];
        self.file
            .deref_mut()
            .read_exact(&mut buffer)
            .map_err(|_| Error::corrupt("unexpected end-of-file while reading index"))?;

        self.digest.update(&buffer);
        Ok(buffer)
    }

    pub(crate) fn write(&mut self, data: &[u8]) -> Result<()> {
        self.file
            .deref_mut()
            .write_all(data)
            .map_err(|e| Error::io(&self.path, e))?;
        self.digest.update(data);
        Ok(())
    }

    pub(crate) fn write_checksum(&mut self) -> Result<()> {
        let checksum = self.digest.finalize();
        self.file
            .deref_mut()
            .write_all(&checksum)
            .map_err(|e| Error::io(&self.path, e))
    }

    pub(crate) fn verify(&mut self) -> Result<()> {
        let mut expected = vec![0u8; self.algorithm.byte_len()];
        self.file
            .deref_mut()
            .read_exact(&mut expected)
            .map_err(|_| Error::corrupt("index is missing its checksum"))?;

        if expected != self.digest.finalize() {
            return Err(Error::corrupt("index checksum does not match its content"));
        }

        Ok(())
    }
}
