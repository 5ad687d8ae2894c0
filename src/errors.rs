//! Error types for the diff/merge core
//!
//! Every fallible operation in the library returns [`Result`], whose error
//! variants follow the taxonomy the callers care about:
//!
//! - lookup errors (`NotFound`, `UnexpectedKind`): an id did not resolve to
//!   the expected object; never retried since content addressing means a
//!   missing object cannot reappear
//! - argument errors (`InvalidArgument`): rejected at the boundary, before
//!   any store access or mutation
//! - graph errors (`NoMergeBase`, `UnknownRevision`): structured outcomes
//!   the caller may recover from
//! - encoding errors (`Corrupt`) for malformed objects, refs and index files
//! - I/O errors, split between repository I/O (`Io`) and failures while
//!   writing diff output (`OutputIo`)
//!
//! Merge conflicts are not errors; they are reported through
//! [`crate::artifacts::merge::merge_result::MergeResult`].

use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The object id is not present in the object store.
    #[error("object {0} not found")]
    NotFound(ObjectId),

    /// The object exists but has a different kind than required.
    #[error("object {oid} is a {found}, expected a {expected}")]
    UnexpectedKind {
        oid: ObjectId,
        expected: ObjectType,
        found: ObjectType,
    },

    /// A caller supplied an input of the wrong shape or combination.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The two commits share no history.
    #[error("no merge base found between {ours} and {theirs}")]
    NoMergeBase { ours: ObjectId, theirs: ObjectId },

    /// A revision expression could not be resolved.
    #[error("unknown revision '{0}'")]
    UnknownRevision(String),

    /// Malformed on-disk or in-memory encoding.
    #[error("corrupt data: {0}")]
    Corrupt(String),

    /// Filesystem failure inside the repository.
    #[error("i/o error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Filesystem failure while writing diff output.
    #[error("failed to write diff output to {path}: {source}")]
    OutputIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub fn corrupt(message: impl Into<String>) -> Self {
        Error::Corrupt(message.into())
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Error::InvalidArgument(message.into())
    }

    pub fn is_lookup_error(&self) -> bool {
        matches!(self, Error::NotFound(_) | Error::UnexpectedKind { .. })
    }

    pub fn is_graph_error(&self) -> bool {
        matches!(self, Error::NoMergeBase { .. } | Error::UnknownRevision(_))
    }

    pub fn is_output_error(&self) -> bool {
        matches!(self, Error::OutputIo { .. })
    }
}
