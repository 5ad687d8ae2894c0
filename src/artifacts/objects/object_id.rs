//! Object identifiers (content hashes)
//!
//! An object id is the hash of an object's canonical encoding. Two hash
//! algorithms are supported: SHA-1 (20 bytes) and SHA-256 (32 bytes).
//! Identity is plain byte equality.
//!
//! ## Storage
//!
//! Loose objects are stored under `objects/<first-2-hex>/<remaining-hex>`.

use crate::errors::{Error, Result};
use sha1::Digest;
use std::io;
use std::path::PathBuf;

/// Number of hex characters shown in abbreviated ids
pub const SHORT_OID_LENGTH: usize = 7;

/// Hash algorithm backing a repository's object ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HashAlgorithm {
    #[default]
    Sha1,
    Sha256,
}

impl HashAlgorithm {
    pub fn byte_len(&self) -> usize {
        match self {
            HashAlgorithm::Sha1 => 20,
            HashAlgorithm::Sha256 => 32,
        }
    }

    pub fn hex_len(&self) -> usize {
        self.byte_len() * 2
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha1 => "sha1",
            HashAlgorithm::Sha256 => "sha256",
        }
    }

    /// Hash arbitrary bytes into an object id
    pub fn digest(&self, data: &[u8]) -> ObjectId {
        match self {
            HashAlgorithm::Sha1 => {
                let mut hasher = sha1::Sha1::new();
                hasher.update(data);
                ObjectId::Sha1(hasher.finalize().into())
            }
            HashAlgorithm::Sha256 => {
                let mut hasher = sha2::Sha256::new();
                hasher.update(data);
                ObjectId::Sha256(hasher.finalize().into())
            }
        }
    }
}

impl TryFrom<&str> for HashAlgorithm {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        match value {
            "sha1" => Ok(HashAlgorithm::Sha1),
            "sha256" => Ok(HashAlgorithm::Sha256),
            other => Err(Error::invalid_argument(format!(
                "unsupported object format: {other}"
            ))),
        }
    }
}

/// Content hash identifying an object
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectId {
    Sha1([u8; 20]),
    Sha256([u8; 32]),
}

impl ObjectId {
    /// Parse and validate a full-length hex object id
    ///
    /// The length selects the algorithm: 40 hex chars for SHA-1 and 64 for
    /// SHA-256.
    pub fn try_parse(id: &str) -> Result<Self> {
        if !id.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::invalid_argument(format!(
                "invalid object id characters: {id}"
            )));
        }

        match id.len() {
            40 => {
                let mut bytes = [0u8; 20];
                Self::decode_hex(id, &mut bytes)?;
                Ok(ObjectId::Sha1(bytes))
            }
            64 => {
                let mut bytes = [0u8; 32];
                Self::decode_hex(id, &mut bytes)?;
                Ok(ObjectId::Sha256(bytes))
            }
            other => Err(Error::invalid_argument(format!(
                "invalid object id length: {other}"
            ))),
        }
    }

    /// Build an id from raw bytes, which must match the algorithm width
    pub fn from_bytes(algorithm: HashAlgorithm, raw: &[u8]) -> Result<Self> {
        if raw.len() != algorithm.byte_len() {
            return Err(Error::corrupt(format!(
                "expected {} id bytes, got {}",
                algorithm.byte_len(),
                raw.len()
            )));
        }

        Ok(match algorithm {
            HashAlgorithm::Sha1 => {
                let mut bytes = [0u8; 20];
                bytes.copy_from_slice(raw);
                ObjectId::Sha1(bytes)
            }
            HashAlgorithm::Sha256 => {
                let mut bytes = [0u8; 32];
                bytes.copy_from_slice(raw);
                ObjectId::Sha256(bytes)
            }
        })
    }

    /// The all-zero id used for "no object" in patch headers
    pub fn null(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Sha1 => ObjectId::Sha1([0; 20]),
            HashAlgorithm::Sha256 => ObjectId::Sha256([0; 32]),
        }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        match self {
            ObjectId::Sha1(_) => HashAlgorithm::Sha1,
            ObjectId::Sha256(_) => HashAlgorithm::Sha256,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            ObjectId::Sha1(bytes) => bytes,
            ObjectId::Sha256(bytes) => bytes,
        }
    }

    /// Write the raw id bytes (used inside tree and index encodings)
    pub fn write_raw_to<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(self.as_bytes())
    }

    /// Read raw id bytes of the given algorithm's width
    pub fn read_raw_from<R: io::Read + ?Sized>(
        algorithm: HashAlgorithm,
        reader: &mut R,
    ) -> Result<Self> {
        let mut buffer = vec![0u8; algorithm.byte_len()];
        reader
            .read_exact(&mut buffer)
            .map_err(|_| Error::corrupt("unexpected EOF in object id"))?;

        Self::from_bytes(algorithm, &buffer)
    }

    /// Convert to file system path for loose object storage
    ///
    /// For example, `abc123...` becomes `ab/c123...`
    pub fn to_path(&self) -> PathBuf {
        let hex = self.to_string();
        let (dir, file) = hex.split_at(2);
        PathBuf::from(dir).join(file)
    }

    /// First 7 characters of the hex form
    pub fn to_short_oid(&self) -> String {
        let mut hex = self.to_string();
        hex.truncate(SHORT_OID_LENGTH);
        hex
    }

    fn decode_hex(hex: &str, out: &mut [u8]) -> Result<()> {
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
                .map_err(|_| Error::invalid_argument(format!("invalid hex digit in {hex}")))?;
        }

        Ok(())
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for byte in self.as_bytes() {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ObjectId({self})")
    }
}
