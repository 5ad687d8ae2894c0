use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object_id::{HashAlgorithm, ObjectId};
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::tag::Tag;
use crate::artifacts::objects::tree::Tree;
use crate::errors::{Error, Result};
use bytes::Bytes;
use std::io::{BufRead, Cursor, Read};

/// Types with a canonical `<kind> <size>\0<body>` encoding
pub trait Packable {
    fn object_type(&self) -> ObjectType;

    /// The encoded body, without the header
    fn body(&self) -> Result<Bytes>;

    fn serialize(&self) -> Result<Bytes> {
        let body = self.body()?;
        let header = format!("{} {}\0", self.object_type().as_str(), body.len());

        let mut bytes = Vec::with_capacity(header.len() + body.len());
        bytes.extend_from_slice(header.as_bytes());
        bytes.extend_from_slice(&body);

        Ok(Bytes::from(bytes))
    }

    // TODO: cache the serialization once trees are built incrementally
    fn object_id(&self, algorithm: HashAlgorithm) -> Result<ObjectId> {
        Ok(algorithm.digest(&self.serialize()?))
    }
}

/// Types that can be decoded from a body reader (the header is already consumed)
pub trait Unpackable {
    fn deserialize(reader: impl BufRead, algorithm: HashAlgorithm) -> Result<Self>
    where
        Self: Sized;
}

/// Any object held by the store, tagged by kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Object {
    Blob(Blob),
    Tree(Tree),
    Commit(Commit),
    Tag(Tag),
}

impl Object {
    /// Decode a full encoding (header included)
    pub fn parse(data: &[u8], algorithm: HashAlgorithm) -> Result<Self> {
        let mut reader = Cursor::new(data);
        let (object_type, size) = ObjectType::parse_header(&mut reader)?;

        let remaining = data.len() - reader.position() as usize;
        if remaining != size {
            return Err(Error::corrupt(format!(
                "{object_type} declares {size} bytes but holds {remaining}"
            )));
        }

        let body = reader.take(size as u64);
        match object_type {
            ObjectType::Blob => Ok(Object::Blob(Blob::deserialize(body, algorithm)?)),
            ObjectType::Tree => Ok(Object::Tree(Tree::deserialize(body, algorithm)?)),
            ObjectType::Commit => Ok(Object::Commit(Commit::deserialize(body, algorithm)?)),
            ObjectType::Tag => Ok(Object::Tag(Tag::deserialize(body, algorithm)?)),
        }
    }

    pub fn kind(&self) -> ObjectType {
        self.object_type()
    }

    /// Human readable rendering, like `cat-file -p`
    pub fn display(&self) -> String {
        match self {
            Object::Blob(blob) => String::from_utf8_lossy(blob.content()).into_owned(),
            Object::Tree(tree) => tree.display(),
            Object::Commit(commit) => commit.display(),
            Object::Tag(tag) => tag.display(),
        }
    }
}

impl Packable for Object {
    fn object_type(&self) -> ObjectType {
        match self {
            Object::Blob(_) => ObjectType::Blob,
            Object::Tree(_) => ObjectType::Tree,
            Object::Commit(_) => ObjectType::Commit,
            Object::Tag(_) => ObjectType::Tag,
        }
    }

    fn body(&self) -> Result<Bytes> {
        match self {
            Object::Blob(blob) => blob.body(),
            Object::Tree(tree) => tree.body(),
            Object::Commit(commit) => commit.body(),
            Object::Tag(tag) => tag.body(),
        }
    }
}

impl From<Blob> for Object {
    fn from(blob: Blob) -> Self {
        Object::Blob(blob)
    }
}

impl From<Tree> for Object {
    fn from(tree: Tree) -> Self {
        Object::Tree(tree)
    }
}

impl From<Commit> for Object {
    fn from(commit: Commit) -> Self {
        Object::Commit(commit)
    }
}

impl From<Tag> for Object {
    fn from(tag: Tag) -> Self {
        Object::Tag(tag)
    }
}

pub(crate) fn read_body(mut reader: impl BufRead) -> Result<Vec<u8>> {
    let mut content = Vec::new();
    reader
        .read_to_end(&mut content)
        .map_err(|e| Error::corrupt(format!("unreadable object body: {e}")))?;

    Ok(content)
}
