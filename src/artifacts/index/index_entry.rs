//! Index entry representation
//!
//! Each entry records a tracked path, the id and mode of its staged content,
//! its merge stage and the file metadata used for fast change detection.
//!
//! ## Entry Format
//!
//! ```text
//! ctime, ctime_nsec, mtime, mtime_nsec, dev, ino, mode, uid, gid, size (u32 each)
//! object id (20 or 32 bytes)
//! flags (u16): stage in bits 12-13, path length in bits 0-11
//! path, NUL padded to a multiple of 8 bytes
//! ```

use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::objects::file_mode::FileMode;
use crate::artifacts::objects::object_id::{HashAlgorithm, ObjectId};
use crate::errors::{Error, Result};
use byteorder::{ByteOrder, WriteBytesExt};
use derive_new::new;
use is_executable::IsExecutable;
use std::cmp::min;
use std::fs::Metadata;
use std::os::unix::prelude::MetadataExt;
use std::path::{Path, PathBuf};

/// Longest path length representable in the flags field
const MAX_PATH_SIZE: usize = 0xfff;

/// Entries are padded to multiples of this many bytes
pub const ENTRY_BLOCK: usize = 8;

/// Size of the stat fields preceding the object id
const STAT_SIZE: usize = 40;

const STAGE_SHIFT: u16 = 12;
const STAGE_MASK: u16 = 0x3000;

/// Merge stage of an index entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Stage {
    /// Cleanly staged content
    #[default]
    Merged = 0,
    /// Common ancestor version of a conflicted path
    Base = 1,
    Ours = 2,
    Theirs = 3,
}

impl Stage {
    pub fn as_u16(&self) -> u16 {
        *self as u16
    }
}

impl TryFrom<u16> for Stage {
    type Error = Error;

    fn try_from(value: u16) -> Result<Self> {
        match value {
            0 => Ok(Stage::Merged),
            1 => Ok(Stage::Base),
            2 => Ok(Stage::Ours),
            3 => Ok(Stage::Theirs),
            other => Err(Error::corrupt(format!("invalid index stage {other}"))),
        }
    }
}

/// File status captured when the entry was staged
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryMetadata {
    pub ctime: i64,
    pub ctime_nsec: i64,
    pub mtime: i64,
    pub mtime_nsec: i64,
    pub dev: u64,
    pub ino: u64,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
}

impl From<&Metadata> for EntryMetadata {
    fn from(metadata: &Metadata) -> Self {
        EntryMetadata {
            ctime: metadata.ctime(),
            ctime_nsec: metadata.ctime_nsec(),
            mtime: metadata.mtime(),
            mtime_nsec: metadata.mtime_nsec(),
            dev: metadata.dev(),
            ino: metadata.ino(),
            uid: metadata.uid(),
            gid: metadata.gid(),
            size: metadata.size(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct IndexEntry {
    /// Path relative to the repository root
    pub name: PathBuf,
    pub oid: ObjectId,
    pub mode: FileMode,
    #[new(default)]
    pub stage: Stage,
    #[new(default)]
    pub metadata: EntryMetadata,
}

impl IndexEntry {
    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stage = stage;
        self
    }

    pub fn with_metadata(mut self, metadata: EntryMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn as_database_entry(&self) -> DatabaseEntry {
        DatabaseEntry::new(self.oid, self.mode)
    }

    /// Parent directories from the outermost inwards, excluding the root
    pub fn parent_dirs(&self) -> Vec<&Path> {
        let mut dirs = self
            .name
            .ancestors()
            .skip(1)
            .filter(|dir| !dir.as_os_str().is_empty())
            .collect::<Vec<_>>();
        dirs.reverse();
        dirs
    }

    /// Whether the cached stat still describes the file on disk
    pub fn stat_match(&self, metadata: &EntryMetadata, mode: FileMode) -> bool {
        self.metadata.size == metadata.size && self.mode == mode
    }

    pub fn times_match(&self, metadata: &EntryMetadata) -> bool {
        self.metadata.ctime == metadata.ctime
            && self.metadata.ctime_nsec == metadata.ctime_nsec
            && self.metadata.mtime == metadata.mtime
            && self.metadata.mtime_nsec == metadata.mtime_nsec
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let name = self
            .name
            .to_str()
            .ok_or_else(|| Error::invalid_argument(format!("non utf-8 path {:?}", self.name)))?;
        let flags = (self.stage.as_u16() << STAGE_SHIFT) | min(name.len(), MAX_PATH_SIZE) as u16;

        let mut bytes = Vec::new();
        let stat = [
            self.metadata.ctime as u32,
            self.metadata.ctime_nsec as u32,
            self.metadata.mtime as u32,
            self.metadata.mtime_nsec as u32,
            self.metadata.dev as u32,
            self.metadata.ino as u32,
            self.mode.as_u32(),
            self.metadata.uid,
            self.metadata.gid,
            self.metadata.size as u32,
        ];
        for field in stat {
            let _ = bytes.write_u32::<byteorder::NetworkEndian>(field);
        }
        bytes.extend_from_slice(self.oid.as_bytes());
        let _ = bytes.write_u16::<byteorder::NetworkEndian>(flags);
        bytes.extend_from_slice(name.as_bytes());

        // at least one NUL, then pad to the block size
        bytes.push(0);
        while bytes.len() % ENTRY_BLOCK != 0 {
            bytes.push(0);
        }

        Ok(bytes)
    }

    /// Size of the fixed part preceding the path
    pub fn fixed_size(algorithm: HashAlgorithm) -> usize {
        STAT_SIZE + algorithm.byte_len() + 2
    }

    /// Decode an entry whose bytes (padding included) are all in `bytes`
    pub fn decode(bytes: &[u8], algorithm: HashAlgorithm) -> Result<Self> {
        let fixed = Self::fixed_size(algorithm);
        if bytes.len() < fixed + 1 {
            return Err(Error::corrupt("index entry is truncated"));
        }

        let field = |i: usize| byteorder::NetworkEndian::read_u32(&bytes[i * 4..i * 4 + 4]);
        let mode = FileMode::try_from(field(6))?;
        let oid = ObjectId::from_bytes(algorithm, &bytes[STAT_SIZE..STAT_SIZE + algorithm.byte_len()])?;
        let flags = byteorder::NetworkEndian::read_u16(&bytes[fixed - 2..fixed]);
        let stage = Stage::try_from((flags & STAGE_MASK) >> STAGE_SHIFT)?;

        let name_end = bytes[fixed..]
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| Error::corrupt("index entry path is not terminated"))?;
        let name = std::str::from_utf8(&bytes[fixed..fixed + name_end])
            .map_err(|_| Error::corrupt("index entry path is not utf-8"))?;

        Ok(IndexEntry {
            name: PathBuf::from(name),
            oid,
            mode,
            stage,
            metadata: EntryMetadata {
                ctime: field(0) as i64,
                ctime_nsec: field(1) as i64,
                mtime: field(2) as i64,
                mtime_nsec: field(3) as i64,
                dev: field(4) as u64,
                ino: field(5) as u64,
                uid: field(7),
                gid: field(8),
                size: field(9) as u64,
            },
        })
    }
}

/// Mode of a workspace file as it would be staged
pub fn mode_for_path(path: &Path, metadata: &Metadata) -> FileMode {
    if metadata.file_type().is_symlink() {
        FileMode::Symlink
    } else if metadata.is_dir() {
        FileMode::Tree
    } else if path.is_executable() {
        FileMode::Executable
    } else {
        FileMode::Blob
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    #[fixture]
    fn oid() -> ObjectId {
        HashAlgorithm::Sha1.digest(b"test data")
    }

    #[rstest]
    fn lists_parent_dirs_outermost_first(oid: ObjectId) {
        let entry = IndexEntry::new(PathBuf::from("a/b/c"), oid, FileMode::Blob);

        assert_eq!(entry.parent_dirs(), vec![Path::new("a"), Path::new("a/b")]);
    }

    #[rstest]
    fn top_level_entries_have_no_parents(oid: ObjectId) {
        let entry = IndexEntry::new(PathBuf::from("a"), oid, FileMode::Blob);

        assert_eq!(entry.parent_dirs(), Vec::<&Path>::new());
    }

    #[rstest]
    #[case(Stage::Merged)]
    #[case(Stage::Theirs)]
    fn keeps_stage_and_padding(oid: ObjectId, #[case] stage: Stage) {
        let entry = IndexEntry::new(PathBuf::from("dir/file.txt"), oid, FileMode::Executable)
            .with_stage(stage);

        let bytes = entry.encode().unwrap();
        assert_eq!(bytes.len() % ENTRY_BLOCK, 0);
        assert_eq!(IndexEntry::decode(&bytes, HashAlgorithm::Sha1).unwrap(), entry);
    }
}
