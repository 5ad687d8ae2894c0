//! Index file format
//!
//! The index stores the staged snapshot, plus the three-way entries of
//! paths left conflicted by a merge.
//!
//! ## File Format (Version 2)
//!
//! ```text
//! Header (12 bytes):
//!   - Signature: "DIRC" (4 bytes)
//!   - Version: 2 (4 bytes)
//!   - Entry count (4 bytes)
//!
//! Entries (variable length):
//!   - Each entry padded to 8-byte alignment
//!   - Sorted by path, then stage
//!
//! Checksum:
//!   - Hash of all preceding bytes, using the repository's hash algorithm
//! ```

pub mod checksum;
pub mod index_entry;
pub mod index_header;

/// Size of index header in bytes
pub const HEADER_SIZE: usize = 12;

/// Magic signature identifying index files
pub const SIGNATURE: &[u8; 4] = b"DIRC";

/// Index file format version
pub const VERSION: u32 = 2;
