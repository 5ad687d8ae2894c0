//! Value types and algorithms
//!
//! - `branch`: ref names and revision expressions
//! - `credentials`: credential records for remote transports
//! - `database`: `(id, mode)` entries as referenced from trees
//! - `diff`: tree diffing, line diffs (Myers), rename detection, patches
//! - `graph`: commit graph traversal and merge-base search
//! - `index`: index file encoding
//! - `merge`: line and tree three-way merging
//! - `objects`: blob, tree, commit and tag objects

pub mod branch;
pub mod credentials;
pub mod database;
pub mod diff;
pub mod graph;
pub mod index;
pub mod merge;
pub mod objects;
