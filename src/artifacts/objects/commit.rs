//! Commit object
//!
//! A commit records a tree snapshot, its parent commits, the author and
//! committer signatures and a free-form message.
//!
//! ## Format
//!
//! On disk:
//! ```text
//! commit <size>\0
//! tree <tree-id>
//! parent <parent-id>
//! author <name> <email> <timestamp> <timezone>
//! committer <name> <email> <timestamp> <timezone>
//!
//! <commit message>
//! ```

use crate::artifacts::objects::object::{Packable, Unpackable, read_body};
use crate::artifacts::objects::object_id::{HashAlgorithm, ObjectId};
use crate::artifacts::objects::object_type::ObjectType;
use crate::errors::{Error, Result};
use bytes::Bytes;
use chrono::{DateTime, FixedOffset};
use std::io::BufRead;

/// Author, committer or tagger identity with a timestamp
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Signature {
    name: String,
    email: String,
    timestamp: DateTime<FixedOffset>,
}

impl Signature {
    /// Signature stamped with the current local time
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Signature {
            name: name.into(),
            email: email.into(),
            timestamp: chrono::Local::now().fixed_offset(),
        }
    }

    pub fn new_with_timestamp(
        name: impl Into<String>,
        email: impl Into<String>,
        timestamp: DateTime<FixedOffset>,
    ) -> Self {
        Signature {
            name: name.into(),
            email: email.into(),
            timestamp,
        }
    }

    /// Read `GIT_AUTHOR_NAME`, `GIT_AUTHOR_EMAIL` and optionally `GIT_AUTHOR_DATE`
    ///
    /// Only the command line layer calls this; the library always takes an
    /// explicit signature.
    pub fn load_from_env() -> Result<Self> {
        let name = std::env::var("GIT_AUTHOR_NAME")
            .map_err(|_| Error::invalid_argument("GIT_AUTHOR_NAME not set"))?;
        let email = std::env::var("GIT_AUTHOR_EMAIL")
            .map_err(|_| Error::invalid_argument("GIT_AUTHOR_EMAIL not set"))?;
        let timestamp = std::env::var("GIT_AUTHOR_DATE").ok().and_then(|date| {
            DateTime::parse_from_rfc2822(&date)
                .or_else(|_| DateTime::parse_from_str(&date, "%Y-%m-%d %H:%M:%S %z"))
                .ok()
        });

        Ok(match timestamp {
            Some(timestamp) => Signature::new_with_timestamp(name, email, timestamp),
            None => Signature::new(name, email),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn timestamp(&self) -> DateTime<FixedOffset> {
        self.timestamp
    }

    /// `Name <email>`
    pub fn display_name(&self) -> String {
        format!("{} <{}>", self.name, self.email)
    }

    /// `Name <email> <unix seconds> <+hhmm>` as stored in objects
    pub fn display(&self) -> String {
        format!(
            "{} <{}> {} {}",
            self.name,
            self.email,
            self.timestamp.timestamp(),
            self.timestamp.format("%z")
        )
    }
}

impl TryFrom<&str> for Signature {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        // Timezone and seconds are the last two space separated fields
        let parts = value.rsplitn(3, ' ').collect::<Vec<_>>();
        let [timezone, seconds, identity] = parts[..] else {
            return Err(Error::corrupt(format!("invalid signature '{value}'")));
        };

        let seconds = seconds
            .parse::<i64>()
            .map_err(|_| Error::corrupt(format!("invalid signature timestamp '{seconds}'")))?;

        let email_start = identity
            .find('<')
            .ok_or_else(|| Error::corrupt("signature is missing '<'"))?;
        let email_end = identity
            .rfind('>')
            .filter(|end| *end > email_start)
            .ok_or_else(|| Error::corrupt("signature is missing '>'"))?;

        let offset = parse_timezone(timezone)?;
        let timestamp = DateTime::from_timestamp(seconds, 0)
            .ok_or_else(|| Error::corrupt(format!("timestamp {seconds} out of range")))?
            .with_timezone(&offset);

        Ok(Signature {
            name: identity[..email_start].trim().to_string(),
            email: identity[email_start + 1..email_end].to_string(),
            timestamp,
        })
    }
}

fn parse_timezone(timezone: &str) -> Result<FixedOffset> {
    let invalid = || Error::corrupt(format!("invalid timezone '{timezone}'"));

    let (sign, digits) = match timezone.split_at_checked(1) {
        Some(("+", digits)) => (1, digits),
        Some(("-", digits)) => (-1, digits),
        _ => return Err(invalid()),
    };
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }

    let hours = digits[..2].parse::<i32>().map_err(|_| invalid())?;
    let minutes = digits[2..].parse::<i32>().map_err(|_| invalid())?;

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

/// The parts of a commit needed for history traversal
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SlimCommit {
    pub oid: ObjectId,
    pub parents: Vec<ObjectId>,
    pub timestamp: DateTime<FixedOffset>,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Commit {
    parents: Vec<ObjectId>,
    tree_oid: ObjectId,
    author: Signature,
    committer: Signature,
    message: String,
}

impl Commit {
    /// Commit whose committer is the author
    pub fn new(
        parents: Vec<ObjectId>,
        tree_oid: ObjectId,
        author: Signature,
        message: impl Into<String>,
    ) -> Self {
        Commit {
            parents,
            tree_oid,
            committer: author.clone(),
            author,
            message: message.into(),
        }
    }

    pub fn with_committer(mut self, committer: Signature) -> Self {
        self.committer = committer;
        self
    }

    /// First line of the message
    pub fn short_message(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn tree_oid(&self) -> ObjectId {
        self.tree_oid
    }

    pub fn parents(&self) -> &[ObjectId] {
        &self.parents
    }

    pub fn parent(&self) -> Option<ObjectId> {
        self.parents.first().copied()
    }

    pub fn author(&self) -> &Signature {
        &self.author
    }

    pub fn committer(&self) -> &Signature {
        &self.committer
    }

    pub fn timestamp(&self) -> DateTime<FixedOffset> {
        self.committer.timestamp()
    }

    pub fn to_slim(&self, oid: ObjectId) -> SlimCommit {
        SlimCommit {
            oid,
            parents: self.parents.clone(),
            timestamp: self.timestamp(),
        }
    }

    pub fn display(&self) -> String {
        String::from_utf8_lossy(&self.encode()).into_owned()
    }

    fn encode(&self) -> Vec<u8> {
        let mut lines = vec![format!("tree {}", self.tree_oid)];
        lines.extend(self.parents.iter().map(|parent| format!("parent {parent}")));
        lines.push(format!("author {}", self.author.display()));
        lines.push(format!("committer {}", self.committer.display()));
        lines.push(String::new());
        lines.push(self.message.clone());

        lines.join("\n").into_bytes()
    }
}

impl Packable for Commit {
    fn object_type(&self) -> ObjectType {
        ObjectType::Commit
    }

    fn body(&self) -> Result<Bytes> {
        Ok(Bytes::from(self.encode()))
    }
}

impl Unpackable for Commit {
    fn deserialize(reader: impl BufRead, _algorithm: HashAlgorithm) -> Result<Self> {
        let content = String::from_utf8(read_body(reader)?)
            .map_err(|_| Error::corrupt("commit is not utf-8"))?;

        let (headers, message) = content
            .split_once("\n\n")
            .ok_or_else(|| Error::corrupt("commit is missing its message separator"))?;

        let mut tree_oid = None;
        let mut parents = Vec::new();
        let mut author = None;
        let mut committer = None;

        for line in headers.lines() {
            let (key, value) = line
                .split_once(' ')
                .ok_or_else(|| Error::corrupt(format!("invalid commit header '{line}'")))?;
            match key {
                "tree" => tree_oid = Some(ObjectId::try_parse(value)?),
                "parent" => parents.push(ObjectId::try_parse(value)?),
                "author" => author = Some(Signature::try_from(value)?),
                "committer" => committer = Some(Signature::try_from(value)?),
                // gpgsig, encoding and friends are not interpreted
                _ => {}
            }
        }

        let tree_oid = tree_oid.ok_or_else(|| Error::corrupt("commit is missing its tree"))?;
        let author = author.ok_or_else(|| Error::corrupt("commit is missing its author"))?;
        let committer = committer.unwrap_or_else(|| author.clone());

        Ok(Commit {
            parents,
            tree_oid,
            author,
            committer,
            message: message.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("A U Thor <author@example.com> 1700000000 +0200", "A U Thor", 7200)]
    #[case("Nobody <> 0 -0530", "Nobody", -(5 * 3600 + 30 * 60))]
    fn parses_signatures(#[case] raw: &str, #[case] name: &str, #[case] offset: i32) {
        let signature = Signature::try_from(raw).unwrap();

        assert_eq!(signature.name(), name);
        assert_eq!(signature.timestamp().offset().local_minus_utc(), offset);
        assert_eq!(signature.display(), raw);
    }

    #[rstest]
    #[case("no timestamp here")]
    #[case("Name email 1700000000 +0000")]
    #[case("Name <email> 1700000000 0000")]
    fn rejects_malformed_signatures(#[case] raw: &str) {
        assert!(Signature::try_from(raw).is_err());
    }

    #[test]
    fn decodes_merge_commits_with_both_parents() {
        let tree = HashAlgorithm::Sha1.digest(b"tree");
        let first = HashAlgorithm::Sha1.digest(b"first");
        let second = HashAlgorithm::Sha1.digest(b"second");
        let author = Signature::try_from("A <a@example.com> 1700000000 +0000").unwrap();
        let committer = Signature::try_from("C <c@example.com> 1700000100 +0000").unwrap();

        let commit = Commit::new(vec![first, second], tree, author, "Merge\n\nbody\n")
            .with_committer(committer.clone());
        let body = commit.body().unwrap();
        let decoded = Commit::deserialize(&body[..], HashAlgorithm::Sha1).unwrap();

        assert_eq!(decoded, commit);
        assert_eq!(decoded.parents(), &[first, second]);
        assert_eq!(decoded.committer(), &committer);
        assert_eq!(decoded.short_message(), "Merge");
    }
}
