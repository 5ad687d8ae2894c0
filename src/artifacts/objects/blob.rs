//! Blob object
//!
//! Blobs store raw file content. They carry no name or mode; those live in
//! the tree entry that references the blob.
//!
//! ## Format
//!
//! On disk: `blob <size>\0<content>`

use crate::artifacts::objects::object::{Packable, Unpackable, read_body};
use crate::artifacts::objects::object_id::HashAlgorithm;
use crate::artifacts::objects::object_type::ObjectType;
use crate::errors::Result;
use bytes::Bytes;
use derive_new::new;
use std::io::BufRead;

/// How many leading bytes are inspected when classifying content as binary
const BINARY_PROBE_LENGTH: usize = 8000;

#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct Blob {
    content: Bytes,
}

impl Blob {
    pub fn content(&self) -> &Bytes {
        &self.content
    }

    pub fn into_content(self) -> Bytes {
        self.content
    }

    /// Content with an embedded NUL near the start is treated as binary
    pub fn is_binary(&self) -> bool {
        is_binary(&self.content)
    }
}

pub fn is_binary(content: &[u8]) -> bool {
    content
        .iter()
        .take(BINARY_PROBE_LENGTH)
        .any(|&byte| byte == 0)
}

impl Packable for Blob {
    fn object_type(&self) -> ObjectType {
        ObjectType::Blob
    }

    fn body(&self) -> Result<Bytes> {
        Ok(self.content.clone())
    }
}

impl Unpackable for Blob {
    fn deserialize(reader: impl BufRead, _algorithm: HashAlgorithm) -> Result<Self> {
        Ok(Self::new(Bytes::from(read_body(reader)?)))
    }
}

impl From<&str> for Blob {
    fn from(content: &str) -> Self {
        Blob::new(Bytes::copy_from_slice(content.as_bytes()))
    }
}
