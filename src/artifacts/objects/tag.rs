//! Annotated tag object
//!
//! On disk:
//! ```text
//! tag <size>\0
//! object <target-id>
//! type <target-kind>
//! tag <name>
//! tagger <name> <email> <timestamp> <timezone>
//!
//! <message>
//! ```

use crate::artifacts::objects::commit::Signature;
use crate::artifacts::objects::object::{Packable, Unpackable, read_body};
use crate::artifacts::objects::object_id::{HashAlgorithm, ObjectId};
use crate::artifacts::objects::object_type::ObjectType;
use crate::errors::{Error, Result};
use bytes::Bytes;
use std::io::BufRead;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    object: ObjectId,
    kind: ObjectType,
    name: String,
    tagger: Option<Signature>,
    message: String,
}

impl Tag {
    pub fn new(
        object: ObjectId,
        kind: ObjectType,
        name: impl Into<String>,
        tagger: Option<Signature>,
        message: impl Into<String>,
    ) -> Self {
        Tag {
            object,
            kind,
            name: name.into(),
            tagger,
            message: message.into(),
        }
    }

    /// The tagged object
    pub fn target(&self) -> ObjectId {
        self.object
    }

    pub fn target_kind(&self) -> ObjectType {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn display(&self) -> String {
        String::from_utf8_lossy(&self.encode()).into_owned()
    }

    fn encode(&self) -> Vec<u8> {
        let mut lines = vec![
            format!("object {}", self.object),
            format!("type {}", self.kind),
            format!("tag {}", self.name),
        ];
        if let Some(tagger) = &self.tagger {
            lines.push(format!("tagger {}", tagger.display()));
        }
        lines.push(String::new());
        lines.push(self.message.clone());

        lines.join("\n").into_bytes()
    }
}

impl Packable for Tag {
    fn object_type(&self) -> ObjectType {
        ObjectType::Tag
    }

    fn body(&self) -> Result<Bytes> {
        Ok(Bytes::from(self.encode()))
    }
}

impl Unpackable for Tag {
    fn deserialize(reader: impl BufRead, _algorithm: HashAlgorithm) -> Result<Self> {
        let content = String::from_utf8(read_body(reader)?)
            .map_err(|_| Error::corrupt("tag is not utf-8"))?;
        let (headers, message) = content.split_once("\n\n").unwrap_or((content.as_str(), ""));

        let mut object = None;
        let mut kind = None;
        let mut name = None;
        let mut tagger = None;

        for line in headers.lines() {
            let (key, value) = line
                .split_once(' ')
                .ok_or_else(|| Error::corrupt(format!("invalid tag header '{line}'")))?;
            match key {
                "object" => object = Some(ObjectId::try_parse(value)?),
                "type" => kind = Some(ObjectType::try_from(value)?),
                "tag" => name = Some(value.to_string()),
                "tagger" => tagger = Some(Signature::try_from(value)?),
                _ => {}
            }
        }

        Ok(Tag {
            object: object.ok_or_else(|| Error::corrupt("tag is missing its object"))?,
            kind: kind.ok_or_else(|| Error::corrupt("tag is missing its type"))?,
            name: name.ok_or_else(|| Error::corrupt("tag is missing its name"))?,
            tagger,
            message: message.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn decodes_annotated_tags() {
        let target = HashAlgorithm::Sha1.digest(b"commit");
        let tagger = Signature::try_from("T <t@example.com> 1700000000 +0000").unwrap();
        let tag = Tag::new(target, ObjectType::Commit, "v1.0", Some(tagger), "release\n");

        let body = tag.body().unwrap();
        let decoded = Tag::deserialize(&body[..], HashAlgorithm::Sha1).unwrap();

        assert_eq!(decoded, tag);
        assert_eq!(decoded.target(), target);
        assert_eq!(decoded.target_kind(), ObjectType::Commit);
    }
}
